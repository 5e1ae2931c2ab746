use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharderError {
    #[error("shard index {shard_index} is out of range: shards_total is {shards_total}")]
    ShardIndexOutOfRange { shard_index: usize, shards_total: usize },

    #[error("shards_total ({shards_total}) exceeds the number of rows in the shards table ({num_shards})")]
    TooManyShards { shards_total: usize, num_shards: usize },

    #[error("shards_total ({shards_total}) does not evenly divide the number of shards-table rows ({num_shards})")]
    UnevenShardsTotal { shards_total: usize, num_shards: usize },

    #[error("{0} inputs were supplied but {1} output paths; every input needs exactly one output, in the same order")]
    MismatchedOutputCount(usize, usize),

    #[error("this Sharder has already extracted a shard and released its readers; build a new one to extract another")]
    AlreadySharded,

    #[error("failed to read metadata of '{0}'")]
    Metadata(String, #[source] std::io::Error),
}
