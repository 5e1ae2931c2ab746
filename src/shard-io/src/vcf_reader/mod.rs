use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};

use anyhow::Result;
use genome::{ContigOrder, Position};
use located_error::LocatedError;
use log::{debug, trace, warn};

mod error;
pub use error::VcfReaderError;

use crate::{record::Record, reference::ReferenceProvider, sink::OutputSink};

/// Bulk-copy reads are issued in buffers of at least this size, so the full-copy
/// phase doesn't pay a syscall per line.
pub const MIN_BULK_COPY_BUFFER: usize = 1 << 20;

/// A seekable, line-oriented cursor over one variant file.
///
/// Exposes `current`/`previous` records with lazy priming (the first accessor after
/// a `seek` reads forward to the first non-comment record), plus the boundary-record
/// splicing and bulk-copy operations the sharding phase needs.
pub struct VcfReader {
    reader: BufReader<File>,
    path: String,
    order: Arc<ContigOrder>,
    channel_size: u64,
    channel_offset: u64,
    current: Option<Record>,
    current_offset: Option<u64>,
    previous: Option<Record>,
    previous_offset: Option<u64>,
    primed: bool,
}

impl VcfReader {
    pub fn open(path: impl AsRef<Path>, order: Arc<ContigOrder>) -> Result<Self> {
        let path = path.as_ref();
        let loc_msg = || format!("While opening variant file '{}'", path.display());
        let file = File::open(path).map_err(|e| VcfReaderError::Open(path.display().to_string(), e)).with_loc(loc_msg)?;
        let channel_size = file.metadata().map_err(|e| VcfReaderError::Metadata(path.display().to_string(), e)).with_loc(loc_msg)?.len();
        debug!("Opened variant file '{}' ({channel_size} bytes)", path.display());
        Ok(Self {
            reader: BufReader::new(file),
            path: path.display().to_string(),
            order,
            channel_size,
            channel_offset: 0,
            current: None,
            current_offset: None,
            previous: None,
            previous_offset: None,
            primed: false,
        })
    }

    #[must_use]
    pub fn channel_size(&self) -> u64 {
        self.channel_size
    }

    /// Reposition the channel. The caller must supply a line-boundary offset (Mindex
    /// entries and previously-saved offsets both guarantee this).
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        trace!("Seeking variant file '{}' to offset {offset}", self.path);
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| VcfReaderError::Seek(self.path.clone(), e))
            .with_loc(|| format!("While seeking variant file '{}' to offset {offset}", self.path))?;
        self.channel_offset = offset;
        self.current = None;
        self.current_offset = None;
        self.previous = None;
        self.previous_offset = None;
        self.primed = false;
        Ok(())
    }

    /// Read one physical line (comment or record), returning its start offset and
    /// text with the trailing newline stripped. `None` at EOF.
    fn read_physical_line(&mut self) -> Result<Option<(u64, String)>> {
        let start = self.channel_offset;
        let mut raw = Vec::new();
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut raw)
            .map_err(|e| VcfReaderError::Read(self.path.clone(), e))
            .with_loc(|| format!("While reading variant file '{}' at offset {start}", self.path))?;
        if bytes_read == 0 {
            return Ok(None);
        }
        self.channel_offset += bytes_read as u64;
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        let line = String::from_utf8_lossy(&raw).into_owned();
        Ok(Some((start, line)))
    }

    /// Read forward, skipping `#`-prefixed comment lines, until the next record or EOF.
    fn read_next_record(&mut self) -> Result<Option<(u64, Record)>> {
        loop {
            match self.read_physical_line()? {
                None => return Ok(None),
                Some((_, line)) if line.starts_with('#') => continue,
                Some((offset, line)) => {
                    let record = Record::parse(&line).with_loc(|| format!("While parsing a record at offset {offset} of '{}'", self.path))?;
                    return Ok(Some((offset, record)));
                }
            }
        }
    }

    fn prime(&mut self) -> Result<()> {
        if self.primed {
            return Ok(());
        }
        self.primed = true;
        match self.read_next_record()? {
            Some((offset, record)) => {
                self.current_offset = Some(offset);
                self.current = Some(record);
            }
            None => {
                self.current_offset = None;
                self.current = None;
            }
        }
        Ok(())
    }

    /// Advance by one record, shifting `current` into `previous`.
    pub fn next(&mut self) -> Result<()> {
        self.prime()?;
        self.previous = self.current.take();
        self.previous_offset = self.current_offset.take();
        match self.read_next_record()? {
            Some((offset, record)) => {
                self.current_offset = Some(offset);
                self.current = Some(record);
            }
            None => {
                self.current_offset = None;
                self.current = None;
            }
        }
        Ok(())
    }

    pub fn current(&mut self) -> Result<Option<&Record>> {
        self.prime()?;
        Ok(self.current.as_ref())
    }

    pub fn previous(&mut self) -> Result<Option<&Record>> {
        self.prime()?;
        Ok(self.previous.as_ref())
    }

    pub fn is_eof(&mut self) -> Result<bool> {
        self.prime()?;
        Ok(self.current.is_none())
    }

    pub fn position(&mut self) -> Result<Option<Position>> {
        self.prime()?;
        self.current.as_ref().map(|record| self.position_of(record)).transpose()
    }

    pub fn previous_position(&mut self) -> Result<Option<Position>> {
        self.prime()?;
        self.previous.as_ref().map(|record| self.position_of(record)).transpose()
    }

    fn position_of(&self, record: &Record) -> Result<Position> {
        Ok(Position::new(record.contig(), record.pos()?, Arc::clone(&self.order))?)
    }

    /// Byte offset the current record starts at, or `None` at EOF.
    pub fn current_offset(&mut self) -> Result<Option<u64>> {
        self.prime()?;
        Ok(self.current_offset)
    }

    /// Byte offset the previous record started at, or `None` if there has been no
    /// previous record since the last `seek`.
    pub fn previous_offset(&mut self) -> Result<Option<u64>> {
        self.prime()?;
        Ok(self.previous_offset)
    }

    /// Move forward until `position() >= target`. With `throw_if_past`, the reader
    /// must not already be strictly past `target` -- that would indicate the caller
    /// picked an inconsistent starting offset.
    pub fn advance_to(&mut self, target: &Position, throw_if_past: bool) -> Result<()> {
        if throw_if_past {
            if let Some(current) = self.position()? {
                if current > *target {
                    warn!("Variant file '{}' is already past target {target} (at {current}); this is a programmer error", self.path);
                    return Err(VcfReaderError::AdvancedPastTarget { target: target.to_string(), actual: current.to_string() }.into());
                }
            }
        }
        loop {
            if self.is_eof()? {
                break;
            }
            let current = self.position()?.expect("checked not EOF above");
            if current >= *target {
                break;
            }
            self.next()?;
        }
        Ok(())
    }

    /// Alias for `advance_to(target, throw_if_past = false)`.
    pub fn advance_to_at_least(&mut self, target: &Position) -> Result<()> {
        self.advance_to(target, false)
    }

    /// Splice the first record of a shard at cut `start`, writing whatever needs
    /// writing into `sink`, and returning the byte offset the bulk copy should
    /// resume from.
    pub fn save_first_record(&mut self, start: &Position, reference: &mut dyn ReferenceProvider, sink: &mut OutputSink) -> Result<u64> {
        self.advance_to(start, true)?;
        if self.is_eof()? {
            return Ok(self.channel_size);
        }

        let after_cut = self.position()?.expect("checked not EOF above");
        if after_cut == *start {
            let current = self.current()?.expect("checked not EOF above").clone();
            sink.write_record(&current.to_line())?;
            return Ok(self.channel_offset);
        }

        if let Some(previous) = self.previous()?.cloned() {
            let before_pos = previous.pos().with_loc(|| format!("While inspecting the record preceding a first-record splice at {start}"))?;
            let before_position = Position::new(previous.contig(), before_pos, Arc::clone(&self.order))?;
            if before_position >= *start {
                return Err(VcfReaderError::FirstRecordInvariant { start: start.to_string(), before: before_position.to_string() }.into());
            }
            if let Some(end) = previous.end_position()? {
                if end >= start.pos() {
                    let base = reference.base_at(start.contig(), start.pos()).with_loc(|| format!("While fetching the reference base to splice at {start}"))?;
                    let spliced = previous.with_spliced_start(start.pos(), base);
                    sink.write_record(&spliced.to_line())?;
                }
            }
        }

        let current = self.current()?.expect("checked not EOF above").clone();
        sink.write_record(&current.to_line())?;
        Ok(self.channel_offset)
    }

    /// Walk forward emitting every record whose position is strictly before
    /// `excluded`, truncating the last one if its reference block extends at or
    /// past `excluded`.
    pub fn save_last_record(&mut self, excluded: &Position, sink: &mut OutputSink) -> Result<()> {
        let mut pending: Option<Record> = None;
        loop {
            if self.is_eof()? {
                break;
            }
            let position = self.position()?.expect("checked not EOF above");
            if position >= *excluded {
                break;
            }
            if let Some(previous_pending) = pending.take() {
                sink.write_record(&previous_pending.to_line())?;
            }
            pending = Some(self.current()?.expect("checked not EOF above").clone());
            self.next()?;
        }

        if let Some(last) = pending {
            let out = match last.end_position()? {
                Some(end) if end > excluded.pos() => {
                    if last.contig() != excluded.contig() {
                        return Err(VcfReaderError::EndSpliceContigMismatch {
                            record_contig: last.contig().to_owned(),
                            cut_contig: excluded.contig().to_owned(),
                        }
                        .into());
                    }
                    last.with_truncated_end(excluded.pos() - 1)
                }
                _ => last,
            };
            sink.write_record(&out.to_line())?;
        }
        Ok(())
    }

    /// Copy raw bytes `[from, to)` straight out of the underlying file, bypassing
    /// record parsing entirely, in buffers of at least [`MIN_BULK_COPY_BUFFER`].
    fn bulk_copy(&mut self, from: u64, to: u64, sink: &mut OutputSink) -> Result<u64> {
        if to <= from {
            return Ok(0);
        }
        self.seek(from)?;
        let mut remaining = to - from;
        let mut buffer = vec![0u8; MIN_BULK_COPY_BUFFER.min(remaining as usize).max(1)];
        let mut copied = 0u64;
        while remaining > 0 {
            let chunk = remaining.min(buffer.len() as u64) as usize;
            self.reader
                .read_exact(&mut buffer[..chunk])
                .map_err(|e| VcfReaderError::Read(self.path.clone(), e))
                .with_loc(|| format!("While bulk-copying '{}' from {from} to {to}", self.path))?;
            sink.write_bytes(&buffer[..chunk])?;
            self.channel_offset += chunk as u64;
            remaining -= chunk as u64;
            copied += chunk as u64;
        }
        Ok(copied)
    }

    /// Full copy of one shard out of this reader: splice the first record at
    /// `start_pos`, bulk-copy the middle, then (unless this is the last output
    /// shard) splice the last record at `end_pos`. Returns the total byte count
    /// written to `sink`.
    #[allow(clippy::too_many_arguments)]
    pub fn copy(
        &mut self,
        start_offset: u64,
        start_pos: &Position,
        end_offset: u64,
        end_pos: Option<&Position>,
        reference: &mut dyn ReferenceProvider,
        sink: &mut OutputSink,
    ) -> Result<u64> {
        if start_offset > self.channel_size {
            return Ok(0);
        }
        let before = sink.bytes_written();

        self.seek(start_offset)?;
        let resume_from = self.save_first_record(start_pos, reference, sink)?;

        // `end_offset` was found independently, by re-seeking the same reader from
        // the end cut's own mindex entry; when the two cuts have nothing between
        // them it can land at or before `resume_from` (e.g. the shard's only record
        // is the one `save_first_record` just spliced). Never let it walk the
        // bulk-copy or the last-record splice backwards over bytes already written.
        let end_offset = end_offset.max(resume_from);

        let bulk_copy_to = if end_pos.is_some() { end_offset } else { self.channel_size };
        self.bulk_copy(resume_from, bulk_copy_to, sink)?;

        if let Some(end_pos) = end_pos {
            self.seek(end_offset)?;
            self.save_last_record(end_pos, sink)?;
        }

        Ok(sink.bytes_written() - before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::InMemoryReference;
    use std::io::Write;

    fn order(contigs: &[&str]) -> Arc<ContigOrder> {
        Arc::new(ContigOrder::from_first_appearance(contigs.iter().copied()))
    }

    fn write_vcf(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn pos(order: &Arc<ContigOrder>, contig: &str, p: u32) -> Position {
        Position::new(contig, p, Arc::clone(order)).unwrap()
    }

    #[test]
    fn lazy_priming_skips_comments() {
        let file = write_vcf("#comment\nchr1\t100\t.\tA\tG\t.\t.\t.\nchr1\t200\t.\tA\tG\t.\t.\t.\n");
        let order = order(&["chr1"]);
        let mut reader = VcfReader::open(file.path(), order).unwrap();
        assert_eq!(reader.position().unwrap().unwrap().pos(), 100);
    }

    #[test]
    fn advance_to_is_idempotent() {
        let file = write_vcf("chr1\t100\t.\tA\tG\t.\t.\t.\nchr1\t200\t.\tA\tG\t.\t.\t.\nchr1\t300\t.\tA\tG\t.\t.\t.\n");
        let order = order(&["chr1"]);
        let mut reader = VcfReader::open(file.path(), order.clone()).unwrap();
        let target = pos(&order, "chr1", 200);
        reader.advance_to(&target, true).unwrap();
        let first = reader.position().unwrap().unwrap();
        reader.advance_to(&target, true).unwrap();
        let second = reader.position().unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.pos(), 200);
    }

    #[test]
    fn advance_to_past_target_with_throw_is_an_error() {
        let file = write_vcf("chr1\t300\t.\tA\tG\t.\t.\t.\n");
        let order = order(&["chr1"]);
        let mut reader = VcfReader::open(file.path(), order.clone()).unwrap();
        let target = pos(&order, "chr1", 100);
        assert!(reader.advance_to(&target, true).is_err());
    }

    #[test]
    fn save_first_record_emits_verbatim_when_no_splice_needed() {
        let file = write_vcf("chr1\t100\t.\tA\tG\t.\t.\t.\n");
        let order = order(&["chr1"]);
        let mut reader = VcfReader::open(file.path(), order.clone()).unwrap();
        let mut reference = InMemoryReference::new();
        let tmpdir = tempfile::tempdir().unwrap();
        let mut sink = OutputSink::create(tmpdir.path().join("out.vcf")).unwrap();

        let start = pos(&order, "chr1", 100);
        reader.save_first_record(&start, &mut reference, &mut sink).unwrap();
        sink.flush().unwrap();
        let contents = std::fs::read_to_string(tmpdir.path().join("out.vcf")).unwrap();
        assert_eq!(contents, "chr1\t100\t.\tA\tG\t.\t.\t.\n");
    }

    #[test]
    fn save_first_record_splices_straddling_reference_block() {
        let file = write_vcf("chr1\t379\t.\tA\t<NON_REF>\t.\t.\tEND=999\nchr1\t1001\t.\tA\tG\t.\t.\t.\n");
        let order = order(&["chr1"]);
        let mut reader = VcfReader::open(file.path(), order.clone()).unwrap();
        let mut reference = InMemoryReference::new().with_contig("chr1", &"N".repeat(1001));
        let tmpdir = tempfile::tempdir().unwrap();
        let mut sink = OutputSink::create(tmpdir.path().join("out.vcf")).unwrap();

        let start = pos(&order, "chr1", 400);
        reader.save_first_record(&start, &mut reference, &mut sink).unwrap();
        sink.flush().unwrap();
        let contents = std::fs::read_to_string(tmpdir.path().join("out.vcf")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "chr1\t400\t.\tN\t<NON_REF>\t.\t.\tEND=999");
        assert_eq!(lines.next().unwrap(), "chr1\t1001\t.\tA\tG\t.\t.\t.");
    }

    #[test]
    fn save_last_record_truncates_only_when_strictly_past_excluded() {
        let order = order(&["chr1"]);
        let tmpdir = tempfile::tempdir().unwrap();

        for (excluded_pos, expected_end) in [(400u32, 399u32), (999, 999), (1000, 999)] {
            let file = write_vcf("chr1\t379\t.\tA\t<NON_REF>\t.\t.\tEND=999\n");
            let mut reader = VcfReader::open(file.path(), order.clone()).unwrap();
            let out_path = tmpdir.path().join(format!("out-{excluded_pos}.vcf"));
            let mut sink = OutputSink::create(&out_path).unwrap();

            let excluded = pos(&order, "chr1", excluded_pos);
            reader.save_last_record(&excluded, &mut sink).unwrap();
            sink.flush().unwrap();

            let contents = std::fs::read_to_string(&out_path).unwrap();
            assert_eq!(contents, format!("chr1\t379\t.\tA\t<NON_REF>\t.\t.\tEND={expected_end}\n"));
        }
    }

    #[test]
    fn copy_clamps_end_offset_when_it_precedes_the_already_spliced_first_record() {
        let file = write_vcf("chr1\t1\t.\tA\tG\t.\t.\t.\nchr1\t360\t.\tA\tG\t.\t.\t.\n");
        let order = order(&["chr1"]);
        let mut reader = VcfReader::open(file.path(), order.clone()).unwrap();
        let mut reference = InMemoryReference::new();
        let tmpdir = tempfile::tempdir().unwrap();
        let mut sink = OutputSink::create(tmpdir.path().join("out.vcf")).unwrap();

        let start = pos(&order, "chr1", 1);
        let end = pos(&order, "chr1", 350);
        // `end_offset` of 0 mimics a reader whose end-cut search re-seeked from byte
        // 0 and found this shard's own first record as "the last record before the
        // cut" -- correct in isolation, but at or before `resume_from` for this copy.
        reader.copy(0, &start, 0, Some(&end), &mut reference, &mut sink).unwrap();
        sink.flush().unwrap();
        let contents = std::fs::read_to_string(tmpdir.path().join("out.vcf")).unwrap();
        assert_eq!(contents, "chr1\t1\t.\tA\tG\t.\t.\t.\n");
    }

    #[test]
    fn copy_tolerates_start_offset_past_end_of_file() {
        let file = write_vcf("chr1\t100\t.\tA\tG\t.\t.\t.\n");
        let order = order(&["chr1"]);
        let mut reader = VcfReader::open(file.path(), order.clone()).unwrap();
        let mut reference = InMemoryReference::new();
        let tmpdir = tempfile::tempdir().unwrap();
        let mut sink = OutputSink::create(tmpdir.path().join("out.vcf")).unwrap();

        let start = pos(&order, "chr1", 200);
        let written = reader.copy(10_000, &start, 10_000, None, &mut reference, &mut sink).unwrap();
        assert_eq!(written, 0);
    }
}
