use std::{
    fs::File,
    io::{ErrorKind, Read, Seek, SeekFrom},
    path::Path,
};

use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt};
use located_error::LocatedError;
use log::{debug, trace};

mod error;
pub use error::MindexError;

/// Wire format of a mindex file. Mindex files are a private contract between the
/// (out-of-scope) index builder and this reader; little-endian was chosen to match
/// the only other fixed-width binary index format in the surrounding corpus.
pub const MINDEX_ENDIANNESS: &str = "little-endian";

/// Sentinel stored in a mindex entry meaning "this shard starts beyond the end of
/// the corresponding variant file".
pub const PAST_EOF: i64 = i64::MAX;

/// Number of consecutive entries pulled into memory on a cache miss.
pub const DEFAULT_PREFETCH: usize = 3;

const ENTRY_WIDTH: u64 = 8;

/// A random-access reader over a mindex file: a raw array of little-endian `i64`
/// byte offsets, one per shard-table row, for one variant file.
///
/// Reads are served from an in-memory window of [`DEFAULT_PREFETCH`] consecutive
/// entries; a request outside the current window triggers one seek-and-refill.
pub struct Mindex {
    file: File,
    path: String,
    prefetch: usize,
    window_base: Option<usize>,
    window: Vec<i64>,
}

impl Mindex {
    /// Open `path` with the default prefetch window ([`DEFAULT_PREFETCH`]).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_prefetch(path, DEFAULT_PREFETCH)
    }

    /// Open `path` with an explicit prefetch window size.
    pub fn with_prefetch(path: impl AsRef<Path>, prefetch: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| MindexError::Open(path.display().to_string(), e))
            .with_loc(|| format!("While opening mindex file '{}'", path.display()))?;
        Ok(Self { file, path: path.display().to_string(), prefetch, window_base: None, window: Vec::new() })
    }

    /// Byte offset for shard `shard_no`, served from cache when possible.
    pub fn get(&mut self, shard_no: usize) -> Result<i64> {
        if let Some(base) = self.window_base {
            if shard_no >= base && shard_no - base < self.window.len() {
                trace!("Mindex '{}': shard {shard_no} served from window at base {base}", self.path);
                return Ok(self.window[shard_no - base]);
            }
        }
        self.reload(shard_no)?;
        Ok(self.window[0])
    }

    fn reload(&mut self, shard_no: usize) -> Result<()> {
        debug!("Mindex '{}': cache miss on shard {shard_no}, reloading a window of {} entries", self.path, self.prefetch);
        let loc_msg = || format!("While reading mindex entry {shard_no} from '{}'", self.path);
        let offset = shard_no as u64 * ENTRY_WIDTH;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| MindexError::Seek(self.path.clone(), e))
            .with_loc(loc_msg)?;

        let mut window = Vec::with_capacity(self.prefetch);
        for _ in 0..self.prefetch {
            match self.file.read_i64::<LittleEndian>() {
                Ok(value) => window.push(value),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(MindexError::Read(self.path.clone(), e)).with_loc(loc_msg),
            }
        }
        if window.is_empty() {
            return Err(MindexError::Read(
                self.path.clone(),
                std::io::Error::new(ErrorKind::UnexpectedEof, "shard index beyond end of mindex file"),
            ))
            .with_loc(loc_msg);
        }
        self.window_base = Some(shard_no);
        self.window = window;
        Ok(())
    }
}
