use std::{fs::File, path::PathBuf};

use located_error::*;
use clap::Parser;
use serde::{Serialize, Deserialize};
use log::debug;

mod error;
pub use error::ParserError;

/// Extract a contiguous, byte-accurate shard from a cohort of aligned VCF/GVCF files.
#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(name = "vcf-sharder", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the verbosity level (-v -vv -vvv)
    ///
    /// Set the verbosity level of this program. Multiple levels allowed {n}
    ///
    /// -v: Info  |  -vv: Debug  | -vvv: Trace {n}
    ///
    /// Note that the program will still output warnings by default, even when this flag is off.
    /// Use --quiet/-q to disable them.
    #[clap(short = 'v', long, parse(from_occurrences), global = true)]
    pub verbose: u8,

    /// Disable warnings. Only errors will be displayed.
    #[clap(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Path to the shards-table file (tab-separated CONTIG/START/END triples).
    #[clap(long)]
    pub shards_table: PathBuf,

    /// 0-based index of the shard to extract.
    #[clap(long)]
    pub shard_index: usize,

    /// Total number of output shards the cohort is being split into. Must evenly divide
    /// the number of rows in the shards-table.
    #[clap(long)]
    pub shards_total: usize,

    /// Input variant file. May be repeated; order must match --mindex.
    #[clap(long = "vcf", required = true, multiple_values = true)]
    pub vcfs: Vec<PathBuf>,

    /// Mindex file for the corresponding --vcf entry, in the same order.
    #[clap(long = "mindex", required = true, multiple_values = true)]
    pub mindexes: Vec<PathBuf>,

    /// Path to the reference FASTA, used only to split a boundary reference block.
    #[clap(long)]
    pub reference: PathBuf,

    /// Directory output shards are written into (one file per --vcf input, same file name).
    #[clap(long)]
    pub output_dir: PathBuf,

    /// Number of worker threads. Defaults to the number of available cores.
    #[clap(long)]
    pub threads: Option<usize>,

    /// Path the metrics YAML document is written to.
    #[clap(long)]
    pub metrics: PathBuf,
}

impl Cli {
    /// Validate cross-field invariants that `clap` cannot express on its own.
    pub fn validate(&self) -> Result<(), ParserError> {
        if self.vcfs.is_empty() {
            return Err(ParserError::NoInputs);
        }
        if self.vcfs.len() != self.mindexes.len() {
            return Err(ParserError::MismatchedVcfAndMindexCount {
                vcfs: self.vcfs.len(),
                mindexes: self.mindexes.len(),
            });
        }
        if self.shard_index >= self.shards_total {
            return Err(ParserError::ShardIndexOutOfRange {
                shard_index: self.shard_index,
                shards_total: self.shards_total,
            });
        }
        for path in self.vcfs.iter().chain(self.mindexes.iter()).chain([&self.shards_table, &self.reference]) {
            if !path.exists() {
                return Err(ParserError::MissingPath(path.display().to_string()));
            }
        }
        Ok(())
    }

    /// Number of worker threads to use, defaulting to the available parallelism.
    #[must_use]
    pub fn resolved_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
        })
    }

    /// Serialize these command line arguments to a timestamped `.yaml` file under
    /// `--output-dir`, for reproducibility logging.
    ///
    /// # Errors
    /// Returns an error if YAML serialization or the write to disk fails.
    pub fn serialize(&self) -> anyhow::Result<()> {
        let serialized = serde_yaml::to_string(self).map_err(ParserError::Serialize).loc("While serializing command line arguments")?;
        debug!("\n---- Command line args ----\n{serialized}\n---");

        let current_time = chrono::offset::Local::now().format("%Y-%m-%dT%H%M%S").to_string();
        let output_file = self.output_dir.join(format!("{current_time}-vcf-sharder.yaml"));

        std::fs::write(&output_file, serialized)
            .map_err(|e| ParserError::WriteSerialized(output_file.display().to_string(), e))
            .loc("While writing serialized command line arguments")
    }

    /// Deserialize a previously-serialized `.yaml` file back into a `Cli`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or does not parse as a `Cli`.
    pub fn deserialize(yaml: PathBuf) -> anyhow::Result<Self> {
        let file = File::open(&yaml).with_loc(|| format!("While opening {}", yaml.display()))?;
        serde_yaml::from_reader(file).with_loc(|| format!("While deserializing {}", yaml.display()))
    }
}
