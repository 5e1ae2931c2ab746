use thiserror::Error;

#[derive(Error, Debug)]
pub enum SafeCutError {
    #[error("{0} inputs were supplied but {1} mindexes; every input needs exactly one mindex, in the same order")]
    MismatchedInputCount(usize, usize),

    #[error("findSafeCut called before init")]
    NotInitialized,

    #[error(
        "unimplemented edge case: the last record of an input is itself a deletion; \
         the safe-cut fixed point cannot determine where its extent ends"
    )]
    LastRecordIsDeletion,
}
