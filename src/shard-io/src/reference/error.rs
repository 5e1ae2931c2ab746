use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Failed to open reference FASTA '{0}'")]
    Open(String, #[source] std::io::Error),

    #[error("Failed to read reference FASTA '{0}'")]
    Read(String, #[source] std::io::Error),

    #[error("Failed to seek within reference FASTA '{0}'")]
    Seek(String, #[source] std::io::Error),

    #[error("Contig '{0}' is not present in the reference FASTA")]
    UnknownContig(String),

    #[error("Position {pos} is out of range for contig '{contig}' (length {len})")]
    PositionOutOfRange { contig: String, pos: u32, len: u64 },

    #[error("Reached end of file while reading a base from '{0}'")]
    UnexpectedEof(String),
}
