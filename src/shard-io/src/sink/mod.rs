use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Result;
use located_error::LocatedError;

pub mod error;
pub use error::SinkError;

/// Minimum buffer size kept in front of the output file, so that the bulk-copy phase
/// never issues a syscall per record.
pub const OUTPUT_BUFFER_CAPACITY: usize = 1 << 20;

/// A single shard's output file.
///
/// Two ways to feed it: [`OutputSink::write_bytes`] for a verbatim byte range copied
/// straight out of a source reader's buffer, and [`OutputSink::write_record`] for a
/// single record line that was spliced or rewritten (first/last record of a shard).
pub struct OutputSink {
    inner: BufWriter<File>,
    bytes_written: u64,
}

impl OutputSink {
    /// Create (or truncate) the output file at `path`, buffered at [`OUTPUT_BUFFER_CAPACITY`].
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loc_msg = || format!("While creating output file '{}'", path.display());
        let file = File::create(path).map_err(SinkError::Open).with_loc(loc_msg)?;
        Ok(Self { inner: BufWriter::with_capacity(OUTPUT_BUFFER_CAPACITY, file), bytes_written: 0 })
    }

    /// Append a verbatim byte range (already newline-terminated where needed).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).map_err(SinkError::Write).with_loc(|| "While writing bytes to output sink")?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Append a single record line, adding the trailing newline.
    pub fn write_record(&mut self, record: &str) -> Result<()> {
        self.inner.write_all(record.as_bytes()).map_err(SinkError::Write).with_loc(|| "While writing a record to output sink")?;
        self.inner.write_all(b"\n").map_err(SinkError::Write).with_loc(|| "While writing a record to output sink")?;
        self.bytes_written += record.len() as u64 + 1;
        Ok(())
    }

    /// Flush the underlying buffer to disk. Callers should do this once, at the end of a copy.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(SinkError::Flush).with_loc(|| "While flushing output sink")
    }

    /// Total bytes written to this sink so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn write_bytes_and_record_round_trip() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("shard.vcf");

        let mut sink = OutputSink::create(&path).unwrap();
        sink.write_bytes(b"##fileformat=VCFv4.2\n").unwrap();
        sink.write_record("chr1\t100\t.\tA\tG\t.\t.\t.").unwrap();
        sink.flush().unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "##fileformat=VCFv4.2\nchr1\t100\t.\tA\tG\t.\t.\t.\n");
    }

    #[test]
    fn create_truncates_existing_file() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("shard.vcf");
        std::fs::write(&path, b"stale content that must not survive").unwrap();

        let mut sink = OutputSink::create(&path).unwrap();
        sink.write_bytes(b"fresh\n").unwrap();
        sink.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "fresh\n");
    }
}
