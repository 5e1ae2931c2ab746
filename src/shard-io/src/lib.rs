//! I/O-facing core of the sharder: external file formats in, typed readers out.
//!
//! This crate owns every format boundary named by the core spec -- the shards
//! table, the mindex, the reference FASTA, the variant files themselves, output
//! sinks, and the metrics sink -- so that `safe-cut` and `sharder` never touch a
//! raw file directly.

pub mod mindex;
pub use mindex::Mindex;

pub mod metrics;
pub use metrics::{InMemoryMetricsSink, MetricsSink, OffsetSummary, ShardMetrics, YamlMetricsSink};

pub mod parse;

pub mod record;
pub use record::Record;

pub mod reference;
pub use reference::{FastaFile, ReferenceCache, ReferenceProvider, SharedReferenceCache};

pub mod shard_table;
pub use shard_table::ShardTable;

pub mod sink;
pub use sink::OutputSink;

pub mod vcf_reader;
pub use vcf_reader::VcfReader;
