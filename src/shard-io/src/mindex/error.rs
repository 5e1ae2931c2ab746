use thiserror::Error;

#[derive(Error, Debug)]
pub enum MindexError {
    #[error("Failed to open mindex file '{0}'")]
    Open(String, #[source] std::io::Error),

    #[error("Failed to seek within mindex file '{0}'")]
    Seek(String, #[source] std::io::Error),

    #[error("Failed to read entry from mindex file '{0}'")]
    Read(String, #[source] std::io::Error),
}
