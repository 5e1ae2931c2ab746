//! Top-level orchestration: given a shard table, a set of input files, and a shard
//! index, find the safe begin/end cuts and copy each input's slice out in parallel.

use std::{fs, path::PathBuf, sync::Arc, time::Instant};

use anyhow::Result;
use genome::Position;
use located_error::LocatedError;
use log::{debug, info, warn};
use parking_lot::Mutex;
use safe_cut::SafeCutFinder;
use shard_io::{parse, MetricsSink, OffsetSummary, OutputSink, ReferenceCache, ShardMetrics, ShardTable, VcfReader};

mod error;
pub use error::SharderError;

/// Owns one safe-cut search over a fixed set of inputs and drives the copy-out phase
/// for a single `--shard-index` invocation.
///
/// Output-path derivation from input names is explicitly left to the caller (the CLI
/// binary): `Sharder` takes one output path per input, in the same order.
pub struct Sharder {
    finder: Option<SafeCutFinder>,
    vcfs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    reference: ReferenceCache,
    metrics: Arc<dyn MetricsSink + Send + Sync>,
    threads: usize,
}

impl Sharder {
    /// Open every input/mindex pair and validate that `vcfs`, `mindexes`, and
    /// `outputs` all agree in length.
    pub fn new(
        shard_table: ShardTable,
        vcfs: Vec<PathBuf>,
        mindexes: Vec<PathBuf>,
        outputs: Vec<PathBuf>,
        reference_path: impl Into<PathBuf>,
        metrics: Arc<dyn MetricsSink + Send + Sync>,
        threads: usize,
    ) -> Result<Self> {
        if vcfs.len() != outputs.len() {
            return Err(SharderError::MismatchedOutputCount(vcfs.len(), outputs.len()).into());
        }
        let finder = SafeCutFinder::open(shard_table, &vcfs, &mindexes, threads).with_loc(|| "While opening inputs for sharding")?;
        Ok(Self {
            finder: Some(finder),
            vcfs,
            outputs,
            reference: ReferenceCache::new(reference_path.into()),
            metrics,
            threads: threads.max(1),
        })
    }

    /// Extract shard `shard_index` of `shards_total`, copy it to the configured
    /// output paths, and record the resulting [`ShardMetrics`].
    pub fn shard(&mut self, shard_index: usize, shards_total: usize) -> Result<ShardMetrics> {
        let total_timer = Instant::now();
        let finder = self.finder.as_mut().ok_or(SharderError::AlreadySharded)?;
        let num_shards = finder.num_shards();

        if shards_total == 0 || shard_index >= shards_total {
            return Err(SharderError::ShardIndexOutOfRange { shard_index, shards_total }.into());
        }
        if shards_total > num_shards {
            return Err(SharderError::TooManyShards { shards_total, num_shards }.into());
        }
        if num_shards % shards_total != 0 {
            return Err(SharderError::UnevenShardsTotal { shards_total, num_shards }.into());
        }
        let shards_at_a_time = num_shards / shards_total;
        info!("Sharding shard {shard_index} of {shards_total} ({num_shards} total shard-table rows, {} inputs)", self.vcfs.len());

        for output in &self.outputs {
            if let Err(e) = parse::probe_writable(output) {
                warn!("Output '{}' failed pre-flight: {e}", output.display());
                return Err(e).with_loc(|| format!("While pre-flighting output '{}'", output.display()));
            }
        }
        debug!("Pre-flight checks passed for {} output(s)", self.outputs.len());

        let init_timer = Instant::now();
        let begin_shard_no = shard_index * shards_at_a_time;
        debug!("Resolving begin cut at shard {begin_shard_no}");
        finder.init(begin_shard_no)?;
        let begin_cut = finder.find_safe_cut()?;
        let begin_offsets = finder.resume_offsets()?;

        let end_shard_no = (shard_index + 1) * shards_at_a_time;
        let (end_cut, end_offsets) = if end_shard_no < num_shards {
            debug!("Resolving end cut at shard {end_shard_no}");
            finder.init(end_shard_no)?;
            let end_cut = finder.find_safe_cut()?;
            let end_offsets = finder.resume_offsets()?;
            (Some(end_cut), end_offsets)
        } else {
            debug!("Shard {shard_index} is the last shard; end cut is end-of-file for every input");
            let sizes = self
                .vcfs
                .iter()
                .map(|path| fs::metadata(path).map(|metadata| metadata.len()).map_err(|e| SharderError::Metadata(path.display().to_string(), e)))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            (None, sizes)
        };
        let init_s = init_timer.elapsed().as_secs_f64();
        debug!("Safe-cut search resolved in {init_s:.3}s: begin={begin_cut}, end={}", end_cut.as_ref().map_or_else(|| "eof".to_owned(), |cut| cut.to_string()));

        // No further safe-cut rounds are needed once both cuts are known; release
        // every reader/mindex handle before the copy phase opens its own.
        self.finder = None;

        let write_timer = Instant::now();
        let written = self.copy_all(&begin_offsets, &begin_cut, &end_offsets, end_cut.as_ref())?;
        let write_s = write_timer.elapsed().as_secs_f64();

        let metrics = ShardMetrics {
            shard_number: shard_index,
            shards_total,
            vcf_count: self.vcfs.len(),
            threads: self.threads,
            begin_cut: begin_cut.to_string(),
            end_cut: end_cut.map_or_else(|| "null".to_owned(), |cut| cut.to_string()),
            begin_offsets: OffsetSummary::from_values(&begin_offsets),
            end_offsets: OffsetSummary::from_values(&end_offsets),
            output_sizes: OffsetSummary::from_values(&written),
            init_s,
            write_s,
            total_s: total_timer.elapsed().as_secs_f64(),
            ref_queried: self.reference.query_count(),
        };
        info!("Shard {shard_index} of {shards_total} done in {:.3}s ({write_s:.3}s copy)", metrics.total_s);
        self.metrics.record(&metrics).with_loc(|| "While recording shard metrics")?;
        Ok(metrics)
    }

    /// Partition the inputs into `threads` groups and copy each input's slice out in
    /// its own worker, sharing one [`ReferenceCache`] across all of them.
    fn copy_all(&self, begin_offsets: &[u64], begin_cut: &Position, end_offsets: &[u64], end_cut: Option<&Position>) -> Result<Vec<u64>> {
        let n = self.vcfs.len();
        let order = begin_cut.order();
        let chunk_size = n.div_ceil(self.threads).max(1);
        let indices: Vec<usize> = (0..n).collect();

        let written_cell: Mutex<Vec<u64>> = Mutex::new(vec![0; n]);
        let errors_cell: Mutex<Vec<anyhow::Error>> = Mutex::new(Vec::new());
        let written = &written_cell;
        let errors = &errors_cell;

        let pool = rayon::ThreadPoolBuilder::new().num_threads(self.threads).build().expect("failed to build sharder copy worker pool");
        pool.scope(|scope| {
            for chunk in indices.chunks(chunk_size) {
                scope.spawn(move |_| {
                    for &i in chunk {
                        let result = self.copy_one(i, order, begin_offsets[i], begin_cut, end_offsets[i], end_cut);
                        match result {
                            Ok(bytes) => written.lock()[i] = bytes,
                            Err(e) => errors.lock().push(e),
                        }
                    }
                });
            }
        });

        if let Some(e) = errors_cell.into_inner().into_iter().next() {
            return Err(e);
        }
        Ok(written_cell.into_inner())
    }

    fn copy_one(&self, i: usize, order: &Arc<genome::ContigOrder>, begin_offset: u64, begin_cut: &Position, end_offset: u64, end_cut: Option<&Position>) -> Result<u64> {
        let loc_msg = || format!("While copying shard out of '{}'", self.vcfs[i].display());
        let mut reader = VcfReader::open(&self.vcfs[i], Arc::clone(order)).with_loc(loc_msg)?;
        let mut sink = OutputSink::create(&self.outputs[i]).with_loc(loc_msg)?;
        let mut provider = self.reference.as_provider();

        let bytes = reader.copy(begin_offset, begin_cut, end_offset, end_cut, &mut provider, &mut sink).with_loc(loc_msg)?;
        sink.flush().with_loc(loc_msg)?;
        debug!("Copied {bytes} bytes from '{}' to '{}'", self.vcfs[i].display(), self.outputs[i].display());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shard_io::InMemoryMetricsSink;
    use std::io::Write;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn write_mindex(entries: &[i64]) -> tempfile::NamedTempFile {
        use byteorder::{LittleEndian, WriteBytesExt};
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for &entry in entries {
            file.write_i64::<LittleEndian>(entry).unwrap();
        }
        file.flush().unwrap();
        file
    }

    /// Two inputs, one shard-table row per contig, one clean deletion each, no
    /// reference-block splicing needed -- enough to exercise the full `shard()` path
    /// end to end.
    struct Fixture {
        table: tempfile::NamedTempFile,
        vcf_a: tempfile::NamedTempFile,
        vcf_b: tempfile::NamedTempFile,
        mindex_a: tempfile::NamedTempFile,
        mindex_b: tempfile::NamedTempFile,
        reference: tempfile::NamedTempFile,
        outdir: tempfile::TempDir,
    }

    impl Fixture {
        fn build() -> Self {
            let table = write_file("chr1\t1\t378\nchr1\t350\t2000\nchr2\t1\t100\n");
            let vcf_a = write_file(
                "chr1\t1\t.\tA\tG\t.\t.\t.\n\
                 chr1\t360\t.\tA\tG\t.\t.\t.\n\
                 chr2\t1\t.\tA\tG\t.\t.\t.\n",
            );
            let vcf_b = write_file(
                "chr1\t1\t.\tA\tG\t.\t.\t.\n\
                 chr1\t365\t.\tA\tG\t.\t.\t.\n\
                 chr2\t1\t.\tA\tG\t.\t.\t.\n",
            );
            let mindex_a = write_mindex(&[0, 0, 0]);
            let mindex_b = write_mindex(&[0, 0, 0]);
            let reference = write_file(">chr1\nA\n>chr2\nA\n");
            let outdir = tempfile::tempdir().unwrap();
            Self { table, vcf_a, vcf_b, mindex_a, mindex_b, reference, outdir }
        }

        fn sharder(&self, metrics: Arc<dyn MetricsSink + Send + Sync>, threads: usize) -> Sharder {
            let shard_table = ShardTable::load(self.table.path()).unwrap();
            let vcfs = vec![self.vcf_a.path().to_path_buf(), self.vcf_b.path().to_path_buf()];
            let mindexes = vec![self.mindex_a.path().to_path_buf(), self.mindex_b.path().to_path_buf()];
            let outputs = vec![self.outdir.path().join("a.vcf"), self.outdir.path().join("b.vcf")];
            Sharder::new(shard_table, vcfs, mindexes, outputs, self.reference.path(), metrics, threads).unwrap()
        }
    }

    #[test]
    fn shard_zero_of_two_copies_chr1_prefix_to_both_outputs() {
        let fixture = Fixture::build();
        let metrics_sink = Arc::new(InMemoryMetricsSink::new());
        let mut sharder = fixture.sharder(metrics_sink.clone(), 1);

        sharder.shard(0, 3).unwrap();

        let out_a = fs::read_to_string(fixture.outdir.path().join("a.vcf")).unwrap();
        let out_b = fs::read_to_string(fixture.outdir.path().join("b.vcf")).unwrap();
        assert!(out_a.starts_with("chr1\t1\t"));
        assert!(out_b.starts_with("chr1\t1\t"));

        let recorded = metrics_sink.last().unwrap();
        assert_eq!(recorded.shard_number, 0);
        assert_eq!(recorded.shards_total, 3);
        assert_eq!(recorded.vcf_count, 2);
    }

    #[test]
    fn last_shard_copies_through_end_of_file() {
        let fixture = Fixture::build();
        let metrics_sink = Arc::new(InMemoryMetricsSink::new());
        let mut sharder = fixture.sharder(metrics_sink, 1);

        sharder.shard(2, 3).unwrap();

        let out_a = fs::read_to_string(fixture.outdir.path().join("a.vcf")).unwrap();
        assert!(out_a.trim_end().ends_with("chr2\t1\t.\tA\tG\t.\t.\t."));
    }

    #[test]
    fn rejects_shard_index_out_of_range() {
        let fixture = Fixture::build();
        let metrics_sink = Arc::new(InMemoryMetricsSink::new());
        let mut sharder = fixture.sharder(metrics_sink, 1);
        assert!(sharder.shard(3, 3).is_err());
    }

    #[test]
    fn rejects_shards_total_not_dividing_num_shards() {
        let fixture = Fixture::build();
        let metrics_sink = Arc::new(InMemoryMetricsSink::new());
        let mut sharder = fixture.sharder(metrics_sink, 1);
        assert!(sharder.shard(0, 2).is_err());
    }

    #[test]
    fn second_call_to_shard_fails_once_finder_is_released() {
        let fixture = Fixture::build();
        let metrics_sink = Arc::new(InMemoryMetricsSink::new());
        let mut sharder = fixture.sharder(metrics_sink, 1);
        sharder.shard(0, 3).unwrap();
        assert!(sharder.shard(1, 3).is_err());
    }
}
