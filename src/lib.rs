use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use located_error::LocatedError;
use log::info;
use parser::Cli;
use shard_io::{ShardTable, YamlMetricsSink};
use sharder::Sharder;

/// Wire a parsed [`Cli`] into a single [`Sharder::shard`] invocation: validate,
/// derive output paths, extract the shard, and let the caller report the result.
pub fn run(cli: Cli) -> Result<()> {
    logger::init(if cli.quiet { 0 } else { cli.verbose });

    cli.validate().with_loc(|| "While validating command line arguments")?;

    if let Err(e) = cli.serialize() {
        log::warn!("Failed to serialize command line arguments for reproducibility logging: {e}");
    }

    let threads = cli.resolved_threads();
    info!("Loading shards table from '{}'", cli.shards_table.display());
    let shard_table = ShardTable::load(&cli.shards_table).with_loc(|| format!("While loading shards table '{}'", cli.shards_table.display()))?;

    let outputs = output_paths(&cli.vcfs, &cli.output_dir);
    let metrics = Arc::new(YamlMetricsSink::new(&cli.metrics));

    info!(
        "Extracting shard {}/{} across {} input(s) using {threads} worker thread(s)",
        cli.shard_index,
        cli.shards_total,
        cli.vcfs.len()
    );
    let mut sharder = Sharder::new(shard_table, cli.vcfs.clone(), cli.mindexes.clone(), outputs, cli.reference.clone(), metrics, threads)
        .with_loc(|| "While opening inputs for sharding")?;
    let metrics = sharder.shard(cli.shard_index, cli.shards_total).with_loc(|| "While extracting the requested shard")?;

    info!("Shard {} written: begin={} end={} wrote {:.0} bytes (avg)", metrics.shard_number, metrics.begin_cut, metrics.end_cut, metrics.output_sizes.avg);
    Ok(())
}

/// One output path per input, same file name, under `output_dir`. Output-path
/// derivation is intentionally this simple: the inputs are assumed to carry
/// distinct, meaningful file names already.
fn output_paths(vcfs: &[PathBuf], output_dir: &std::path::Path) -> Vec<PathBuf> {
    vcfs.iter()
        .map(|vcf| output_dir.join(vcf.file_name().unwrap_or_else(|| vcf.as_os_str())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_keep_input_file_names() {
        let vcfs = vec![PathBuf::from("/data/sampleA.vcf"), PathBuf::from("/other/sampleB.vcf")];
        let outputs = output_paths(&vcfs, std::path::Path::new("/out"));
        assert_eq!(outputs, vec![PathBuf::from("/out/sampleA.vcf"), PathBuf::from("/out/sampleB.vcf")]);
    }
}
