use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record has only {0} tab-separated fields; at least 8 are required (CONTIG/POS/ID/REF/ALT/QUAL/FILTER/INFO)")]
    TooFewFields(usize),

    #[error("POS field '{0}' is not a valid integer")]
    InvalidPos(String),

    #[error("Record has no END= tag in its INFO field")]
    NoEndTag,

    #[error("END value '{0}' is not a valid integer")]
    InvalidEnd(String),
}
