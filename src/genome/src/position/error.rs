use thiserror::Error;

#[derive(Error, Debug)]
pub enum PositionError {
    #[error("Position must be >= 1, got {0}")]
    NonPositive(u32),
}
