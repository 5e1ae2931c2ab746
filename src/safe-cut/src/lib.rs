//! The fixed-point safe-cut algorithm: advance a tentative genomic position across
//! every input until no input's deletion records would be split by stopping there.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use genome::{ContigOrder, Position};
use located_error::LocatedError;
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use shard_io::{mindex, Mindex, ShardTable, VcfReader};

mod error;
pub use error::SafeCutError;

/// Upper bound on concurrent workers during the init phase, regardless of `threads`.
const INIT_MAX_WORKERS: usize = 32;

/// Inputs are submitted to the init-phase pool in batches this large; the pool is
/// torn down and rebuilt between batches (see module docs on why).
const INIT_BATCH_SIZE: usize = 250;

/// Sentinel `previousOffsets()` returns for an input with no previous record since
/// its last seek.
pub const UNKNOWN_OFFSET: i64 = -1;

/// Fixed-point finder of the nearest safe cut at or after a tentative shard-table
/// position, across every input file.
///
/// One instance owns one open [`VcfReader`]/[`Mindex`] pair per input and is meant
/// to be reused: [`SafeCutFinder::init`] may be called repeatedly to locate the
/// begin and end cuts of consecutive shards without reopening any file.
pub struct SafeCutFinder {
    shard_table: ShardTable,
    readers: Vec<VcfReader>,
    mindexes: Vec<Mindex>,
    order: Arc<ContigOrder>,
    tentative: Option<Position>,
    threads: usize,
}

impl SafeCutFinder {
    /// Open one [`VcfReader`] and one [`Mindex`] per input, in matching order.
    pub fn open(shard_table: ShardTable, vcfs: &[impl AsRef<Path>], mindexes: &[impl AsRef<Path>], threads: usize) -> Result<Self> {
        if vcfs.len() != mindexes.len() {
            return Err(SafeCutError::MismatchedInputCount(vcfs.len(), mindexes.len()).into());
        }
        let order = Arc::clone(shard_table.order());
        let readers = vcfs
            .iter()
            .map(|path| VcfReader::open(path, Arc::clone(&order)))
            .collect::<Result<Vec<_>>>()
            .with_loc(|| "While opening variant files for safe-cut search")?;
        let mindex_readers = mindexes
            .iter()
            .map(Mindex::open)
            .collect::<Result<Vec<_>>>()
            .with_loc(|| "While opening mindex files for safe-cut search")?;
        Ok(Self { shard_table, readers, mindexes: mindex_readers, order, tentative: None, threads: threads.max(1) })
    }

    #[must_use]
    pub fn num_shards(&self) -> usize {
        self.shard_table.num_shards()
    }

    #[must_use]
    pub fn contigs(&self) -> &[String] {
        self.order.contigs()
    }

    /// Seek every reader to shard `shard_no`'s mindex-supplied offset and advance it
    /// to the shard table's tentative position, ready for [`Self::find_safe_cut`].
    pub fn init(&mut self, shard_no: usize) -> Result<()> {
        let tentative = self.shard_table.position(shard_no).clone();
        debug!("Initializing safe-cut search for shard {shard_no} (tentative {tentative}) across {} input(s)", self.readers.len());

        let n = self.readers.len();
        let mut batch_start = 0;
        while batch_start < n.max(1) && batch_start < n {
            let batch_end = (batch_start + INIT_BATCH_SIZE).min(n);
            let workers = if self.threads > 1 { INIT_MAX_WORKERS.min(batch_end - batch_start) } else { 1 };
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers.max(1))
                .build()
                .expect("failed to build safe-cut init worker pool");

            let readers = &mut self.readers[batch_start..batch_end];
            let mindexes = &mut self.mindexes[batch_start..batch_end];
            let tentative_ref = &tentative;
            let errors: Mutex<Vec<anyhow::Error>> = Mutex::new(Vec::new());

            pool.scope(|scope| {
                for (reader, mindex) in readers.iter_mut().zip(mindexes.iter_mut()) {
                    scope.spawn(move |_| {
                        if let Err(e) = init_one(reader, mindex, shard_no, tentative_ref) {
                            errors.lock().push(e);
                        }
                    });
                }
            });

            if let Some(e) = errors.into_inner().into_iter().next() {
                return Err(e);
            }
            batch_start = batch_end;
        }

        self.tentative = Some(tentative);
        Ok(())
    }

    /// Run the fixed-point search described in the module docs, returning the
    /// nearest position at or after the tentative position that splits no
    /// deletion in any input.
    pub fn find_safe_cut(&mut self) -> Result<Position> {
        let mut considering = self.tentative.clone().ok_or(SafeCutError::NotInitialized)?;
        let mut round = 0u32;
        loop {
            let initial = considering.clone();
            let locals = self.advance_round(&initial)?;

            let mut changed = false;
            for local in &locals {
                if *local > considering {
                    considering = local.clone();
                }
                if *local != initial {
                    changed = true;
                }
            }
            round += 1;
            trace!("Safe-cut fixed-point round {round}: considering {considering} (changed={changed})");
            if !changed {
                break;
            }
        }
        debug!("Safe-cut search converged after {round} round(s) at {considering}");
        Ok(considering)
    }

    /// Partition inputs into `parallelism` groups and run each group's inner loop
    /// to its own fixed point, in parallel.
    fn advance_round(&mut self, initial: &Position) -> Result<Vec<Position>> {
        let n = self.readers.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let parallelism = self.threads.max(1).min(n);
        let group_size = n.div_ceil(parallelism);

        let results: Mutex<Vec<Result<Position>>> = Mutex::new(Vec::new());
        rayon::scope(|scope| {
            for chunk in self.readers.chunks_mut(group_size) {
                let results = &results;
                scope.spawn(move |_| {
                    let local = inner_fixed_point(chunk, initial);
                    results.lock().push(local);
                });
            }
        });

        results.into_inner().into_iter().collect()
    }

    /// The byte offset of the last record *not* included in the upcoming shard, per
    /// input, i.e. the offset the sharder resumes the *next* shard's copy from.
    pub fn previous_offsets(&mut self) -> Result<Vec<i64>> {
        self.readers
            .iter_mut()
            .map(|reader| Ok(reader.previous_offset()?.map_or(UNKNOWN_OFFSET, |o| o as i64)))
            .collect()
    }

    /// The byte offset each reader's copy phase should seek to and resume from: the
    /// offset of the record just before the current cut when one was stepped over,
    /// falling back to the current record's own offset when nothing was (nothing
    /// needs splicing in that case, so seeking to it is exact, not approximate), and
    /// to the channel size when the reader is at EOF.
    ///
    /// Unlike [`Self::previous_offsets`], this never returns the `UNKNOWN_OFFSET`
    /// sentinel: the sharder uses these values directly as bulk-copy boundaries,
    /// where an under-shoot silently duplicates records and an over-shoot silently
    /// drops them.
    pub fn resume_offsets(&mut self) -> Result<Vec<u64>> {
        self.readers
            .iter_mut()
            .map(|reader| match reader.previous_offset()? {
                Some(offset) => Ok(offset),
                None => match reader.current_offset()? {
                    Some(offset) => Ok(offset),
                    None => Ok(reader.channel_size()),
                },
            })
            .collect()
    }

    /// Release every open file handle.
    pub fn close(self) {
        drop(self);
    }
}

fn init_one(reader: &mut VcfReader, mindex_entry: &mut Mindex, shard_no: usize, tentative: &Position) -> Result<()> {
    let offset = mindex_entry.get(shard_no)?;
    if offset == mindex::PAST_EOF {
        warn!("Mindex entry for shard {shard_no} is PAST_EOF; treating this input as already exhausted at {tentative}");
        let channel_size = reader.channel_size();
        reader.seek(channel_size)?;
    } else {
        reader.seek(offset as u64)?;
        reader.advance_to(tentative, true)?;
    }
    Ok(())
}

/// One partition's inner loop: repeatedly advance every reader in `chunk` to at
/// least `local`, growing `local` whenever a reader stepped over a deletion that
/// straddled it, until a full pass over the partition makes no further move.
fn inner_fixed_point(chunk: &mut [VcfReader], initial: &Position) -> Result<Position> {
    let mut local = initial.clone();
    loop {
        let local_initial = local.clone();
        for reader in chunk.iter_mut() {
            reader.advance_to_at_least(&local)?;
            if reader.is_eof()? {
                if let Some(previous) = reader.previous()? {
                    if previous.is_deletion() {
                        error!("Last record of an input is itself a deletion straddling {local}; the safe-cut fixed point cannot resolve this");
                        return Err(SafeCutError::LastRecordIsDeletion.into());
                    }
                }
                continue;
            }
            let actual = reader.position()?.expect("checked not EOF above");
            if actual.pos() > local.pos() {
                if let Some(previous) = reader.previous()? {
                    if previous.is_deletion() {
                        trace!("Stepped over a deletion at {actual}; advancing the tentative cut past it");
                        local = actual;
                    }
                }
            }
        }
        if local == local_initial {
            break;
        }
    }
    Ok(local)
}
