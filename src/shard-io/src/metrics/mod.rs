use std::{fs, path::PathBuf};

use anyhow::Result;
use located_error::LocatedError;
use parking_lot::Mutex;
use serde::Serialize;

mod error;
pub use error::MetricsError;

/// `min`/`avg`/`max`/`first` over one family of per-input values (offsets or output
/// sizes) recorded for a single shard invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OffsetSummary {
    pub min: u64,
    pub avg: f64,
    pub max: u64,
    pub first: u64,
}

impl OffsetSummary {
    #[must_use]
    pub fn from_values(values: &[u64]) -> Self {
        if values.is_empty() {
            return Self { min: 0, avg: 0.0, max: 0, first: 0 };
        }
        let min = *values.iter().min().expect("checked non-empty above");
        let max = *values.iter().max().expect("checked non-empty above");
        let sum: u64 = values.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let avg = sum as f64 / values.len() as f64;
        Self { min, avg, max, first: values[0] }
    }
}

/// One shard invocation's worth of counters and durations, handed to a
/// [`MetricsSink`] once the copy phase completes.
#[derive(Debug, Clone, Serialize)]
pub struct ShardMetrics {
    pub shard_number: usize,
    pub shards_total: usize,
    pub vcf_count: usize,
    pub threads: usize,
    pub begin_cut: String,
    pub end_cut: String,
    pub begin_offsets: OffsetSummary,
    pub end_offsets: OffsetSummary,
    pub output_sizes: OffsetSummary,
    pub init_s: f64,
    pub write_s: f64,
    pub total_s: f64,
    pub ref_queried: u64,
}

/// The metrics serialization format is explicitly out of the core's scope -- this
/// trait is the seam. `sharder` depends only on this, never on a concrete format.
pub trait MetricsSink {
    fn record(&self, metrics: &ShardMetrics) -> Result<()>;
}

/// Default [`MetricsSink`]: one YAML document per shard invocation, written with
/// `serde_yaml`, the serialization crate already used for CLI-argument logging.
pub struct YamlMetricsSink {
    path: PathBuf,
}

impl YamlMetricsSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetricsSink for YamlMetricsSink {
    fn record(&self, metrics: &ShardMetrics) -> Result<()> {
        let loc_msg = || format!("While writing shard metrics to '{}'", self.path.display());
        let serialized = serde_yaml::to_string(metrics).map_err(MetricsError::Serialize).with_loc(loc_msg)?;
        fs::write(&self.path, serialized)
            .map_err(|e| MetricsError::Write(self.path.display().to_string(), e))
            .with_loc(loc_msg)
    }
}

/// Test-only [`MetricsSink`] that retains the last recorded [`ShardMetrics`] in
/// memory, so integration tests can assert on it without parsing YAML back out.
#[derive(Default)]
pub struct InMemoryMetricsSink {
    last: Mutex<Option<ShardMetrics>>,
}

impl InMemoryMetricsSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last(&self) -> Option<ShardMetrics> {
        self.last.lock().clone()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn record(&self, metrics: &ShardMetrics) -> Result<()> {
        *self.last.lock() = Some(metrics.clone());
        Ok(())
    }
}
