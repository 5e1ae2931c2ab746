use genome::PositionError;
use thiserror::Error;

use crate::record::RecordError;

#[derive(Error, Debug)]
pub enum VcfReaderError {
    #[error("Failed to open variant file '{0}'")]
    Open(String, #[source] std::io::Error),

    #[error("Failed to seek within variant file '{0}'")]
    Seek(String, #[source] std::io::Error),

    #[error("Failed to read from variant file '{0}'")]
    Read(String, #[source] std::io::Error),

    #[error("Failed to stat variant file '{0}'")]
    Metadata(String, #[source] std::io::Error),

    #[error("Failed to parse record")]
    Parse(#[from] RecordError),

    #[error("Failed to build a Position from a parsed record")]
    Position(#[from] PositionError),

    #[error("advanceTo({target}) called with throwIfPast, but the reader is already past it at {actual}")]
    AdvancedPastTarget { target: String, actual: String },

    #[error("invariant violation: record immediately before a first-record splice at {start} has position {before} which is not strictly before the cut")]
    FirstRecordInvariant { start: String, before: String },

    #[error("invariant violation: end-splice record on contig '{record_contig}' does not match cut contig '{cut_contig}'")]
    EndSpliceContigMismatch { record_contig: String, cut_contig: String },
}
