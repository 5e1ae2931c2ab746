use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use anyhow::Result;
use located_error::LocatedError;
use parking_lot::Mutex;

mod error;
pub use error::ReferenceError;

/// A capability to fetch a single reference base, used only when a boundary record
/// splice needs the base underlying a reference-block record that straddles the cut.
pub trait ReferenceProvider {
    fn base_at(&mut self, contig: &str, pos: u32) -> Result<u8>;
}

struct ContigRecord {
    data_start: u64,
    line_bases: u64,
    line_bytes: u64,
    length: u64,
}

/// A FASTA-file-backed [`ReferenceProvider`]. Indexes contig byte offsets and line
/// geometry on first open (this is the expensive step `ReferenceCache` amortizes by
/// deferring construction until the first real query), then serves single-base
/// lookups by direct seek.
pub struct FastaFile {
    file: File,
    path: String,
    contigs: HashMap<String, ContigRecord>,
}

impl FastaFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loc_msg = || format!("While indexing reference FASTA '{}'", path.display());

        let index_file = File::open(path).map_err(|e| ReferenceError::Open(path.display().to_string(), e)).with_loc(loc_msg)?;
        let mut reader = BufReader::new(index_file);

        let mut contigs = HashMap::new();
        let mut current: Option<(String, u64, u64, u64, u64)> = None; // name, data_start, line_bases, line_bytes, length
        let mut offset: u64 = 0;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).map_err(|e| ReferenceError::Read(path.display().to_string(), e)).with_loc(loc_msg)?;
            if bytes_read == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if let Some(name) = trimmed.strip_prefix('>') {
                if let Some((name, data_start, line_bases, line_bytes, length)) = current.take() {
                    contigs.insert(name, ContigRecord { data_start, line_bases, line_bytes, length });
                }
                let name = name.split_whitespace().next().unwrap_or(name).to_owned();
                current = Some((name, offset + bytes_read as u64, 0, 0, 0));
            } else if let Some((_, _, line_bases, line_bytes, length)) = current.as_mut() {
                if *line_bases == 0 {
                    *line_bases = trimmed.len() as u64;
                    *line_bytes = bytes_read as u64;
                }
                *length += trimmed.len() as u64;
            }
            offset += bytes_read as u64;
        }
        if let Some((name, data_start, line_bases, line_bytes, length)) = current.take() {
            contigs.insert(name, ContigRecord { data_start, line_bases, line_bytes, length });
        }

        let file = File::open(path).map_err(|e| ReferenceError::Open(path.display().to_string(), e)).with_loc(loc_msg)?;
        Ok(Self { file, path: path.display().to_string(), contigs })
    }
}

impl ReferenceProvider for FastaFile {
    fn base_at(&mut self, contig: &str, pos: u32) -> Result<u8> {
        let loc_msg = || format!("While reading base {contig}:{pos} from '{}'", self.path);
        let record = self
            .contigs
            .get(contig)
            .ok_or_else(|| ReferenceError::UnknownContig(contig.to_owned()))
            .with_loc(loc_msg)?;

        if u64::from(pos) == 0 || u64::from(pos) > record.length {
            return Err(ReferenceError::PositionOutOfRange { contig: contig.to_owned(), pos, len: record.length }).with_loc(loc_msg);
        }

        let zero_based = u64::from(pos) - 1;
        let line_idx = zero_based / record.line_bases;
        let col = zero_based % record.line_bases;
        let byte_offset = record.data_start + line_idx * record.line_bytes + col;

        self.file.seek(SeekFrom::Start(byte_offset)).map_err(|e| ReferenceError::Seek(self.path.clone(), e)).with_loc(loc_msg)?;
        let mut buf = [0u8; 1];
        self.file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ReferenceError::UnexpectedEof(self.path.clone())
            } else {
                ReferenceError::Read(self.path.clone(), e)
            }
        }).with_loc(loc_msg)?;
        Ok(buf[0])
    }
}

/// A test-only [`ReferenceProvider`] backed by an in-memory map, so unit tests never
/// touch the filesystem.
#[derive(Default)]
pub struct InMemoryReference {
    contigs: HashMap<String, Vec<u8>>,
}

impl InMemoryReference {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contig(mut self, name: impl Into<String>, sequence: impl AsRef<str>) -> Self {
        self.contigs.insert(name.into(), sequence.as_ref().as_bytes().to_vec());
        self
    }
}

impl ReferenceProvider for InMemoryReference {
    fn base_at(&mut self, contig: &str, pos: u32) -> Result<u8> {
        let sequence = self.contigs.get(contig).ok_or_else(|| ReferenceError::UnknownContig(contig.to_owned()))?;
        sequence
            .get(pos as usize - 1)
            .copied()
            .ok_or_else(|| ReferenceError::PositionOutOfRange { contig: contig.to_owned(), pos, len: sequence.len() as u64 }.into())
    }
}

/// Single-entry cache in front of a lazily-opened [`ReferenceProvider`], guarded by a
/// single mutex so it is safe to share across worker threads. Boundary splices are
/// rare, so one cached `(contig, pos)` is all the hit rate this needs.
pub struct ReferenceCache {
    path: PathBuf,
    inner: Mutex<CacheState>,
}

struct CacheState {
    backend: Option<FastaFile>,
    cached_contig: String,
    cached_pos: i64,
    cached_base: u8,
    query_count: u64,
}

impl ReferenceCache {
    #[must_use]
    pub fn new(fasta_path: impl Into<PathBuf>) -> Self {
        Self {
            path: fasta_path.into(),
            inner: Mutex::new(CacheState { backend: None, cached_contig: String::new(), cached_pos: -1, cached_base: 0, query_count: 0 }),
        }
    }

    /// Fetch a single base, serving from the one-entry cache when `(contig, pos)`
    /// matches the previous call.
    pub fn base_at(&self, contig: &str, pos: u32) -> Result<u8> {
        let mut state = self.inner.lock();
        state.query_count += 1;

        if state.cached_pos == i64::from(pos) && state.cached_contig == contig {
            return Ok(state.cached_base);
        }

        // Invalidate before calling the backend: a failing query must not leave a
        // stale "cached" position behind.
        state.cached_pos = -1;

        if state.backend.is_none() {
            state.backend = Some(FastaFile::open(&self.path).with_loc(|| format!("While lazily opening reference backend '{}'", self.path.display()))?);
        }
        let base = state.backend.as_mut().expect("backend just installed above").base_at(contig, pos)?;

        state.cached_contig = contig.to_owned();
        state.cached_pos = i64::from(pos);
        state.cached_base = base;
        Ok(base)
    }

    #[must_use]
    pub fn query_count(&self) -> u64 {
        self.inner.lock().query_count
    }

    /// Borrow this cache as a [`ReferenceProvider`], so it can be handed to a
    /// [`crate::VcfReader`] that expects `&mut dyn ReferenceProvider` even though the
    /// cache itself only needs `&self` (the mutex is the real synchronization point).
    #[must_use]
    pub fn as_provider(&self) -> SharedReferenceCache<'_> {
        SharedReferenceCache(self)
    }
}

/// Adapter handing out `&mut dyn ReferenceProvider` access to a shared, mutex-guarded
/// [`ReferenceCache`] without requiring `&mut ReferenceCache` itself.
pub struct SharedReferenceCache<'a>(&'a ReferenceCache);

impl ReferenceProvider for SharedReferenceCache<'_> {
    fn base_at(&mut self, contig: &str, pos: u32) -> Result<u8> {
        self.0.base_at(contig, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fasta(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn fasta_file_reads_expected_base() {
        let file = write_fasta(">chr1\nACGTACGT\nACGT\n>chr2\nTTTT\n");
        let mut fasta = FastaFile::open(file.path()).unwrap();
        assert_eq!(fasta.base_at("chr1", 1).unwrap(), b'A');
        assert_eq!(fasta.base_at("chr1", 9).unwrap(), b'A');
        assert_eq!(fasta.base_at("chr1", 12).unwrap(), b'T');
        assert_eq!(fasta.base_at("chr2", 1).unwrap(), b'T');
    }

    #[test]
    fn fasta_file_rejects_unknown_contig() {
        let file = write_fasta(">chr1\nACGT\n");
        let mut fasta = FastaFile::open(file.path()).unwrap();
        assert!(fasta.base_at("chr9", 1).is_err());
    }

    #[test]
    fn in_memory_reference_reads_expected_base() {
        let mut reference = InMemoryReference::new().with_contig("chr1", "ACGTACGT");
        assert_eq!(reference.base_at("chr1", 5).unwrap(), b'A');
    }

    #[test]
    fn cache_increments_query_counter_on_every_call() {
        let file = write_fasta(">chr1\nACGT\n");
        let cache = ReferenceCache::new(file.path());
        cache.base_at("chr1", 1).unwrap();
        cache.base_at("chr1", 1).unwrap();
        assert_eq!(cache.query_count(), 2);
    }

    #[test]
    fn cache_serves_repeat_query_without_reopening_backend() {
        let file = write_fasta(">chr1\nACGT\n");
        let cache = ReferenceCache::new(file.path());
        assert_eq!(cache.base_at("chr1", 2).unwrap(), b'C');
        assert_eq!(cache.base_at("chr1", 2).unwrap(), b'C');
    }
}
