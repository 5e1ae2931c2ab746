use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardTableError {
    #[error("Failed to read shards table file '{0}'")]
    Read(String, #[source] std::io::Error),

    #[error("{path}:{line_no}: expected a multiple of 3 tab-separated fields (CONTIG/START/END triples), found {field_count}")]
    FieldCountNotMultipleOfThree { path: String, line_no: usize, field_count: usize },

    #[error("{path}:{line_no}: START field '{field}' is not a valid integer")]
    InvalidStart { path: String, line_no: usize, field: String },

    #[error("{0}")]
    Position(#[from] genome::PositionError),
}
