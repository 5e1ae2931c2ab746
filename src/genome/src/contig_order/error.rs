use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContigOrderError {
    #[error("Contig '{0}' is not known to this ContigOrder")]
    UnknownContig(String),
}
