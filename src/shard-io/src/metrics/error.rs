use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to serialize shard metrics to YAML")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Failed to write metrics file '{0}'")]
    Write(String, #[source] std::io::Error),
}
