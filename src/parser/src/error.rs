use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("--vcf was given {vcfs} paths but --mindex was given {mindexes}; they must pair up 1-to-1, in the same order")]
    MismatchedVcfAndMindexCount { vcfs: usize, mindexes: usize },

    #[error("--shard-index {shard_index} is out of range: --shards-total is {shards_total}")]
    ShardIndexOutOfRange { shard_index: usize, shards_total: usize },

    #[error("at least one --vcf input is required")]
    NoInputs,

    #[error("{0} does not exist")]
    MissingPath(String),

    #[error("failed to serialize command line arguments to YAML")]
    Serialize(#[source] serde_yaml::Error),

    #[error("failed to write serialized command line arguments to {0}")]
    WriteSerialized(String, #[source] std::io::Error),
}
