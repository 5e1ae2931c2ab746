use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to open output file for writing")]
    Open(#[source] std::io::Error),

    #[error("Failed to write to output file")]
    Write(#[source] std::io::Error),

    #[error("Failed to flush output file")]
    Flush(#[source] std::io::Error),
}
