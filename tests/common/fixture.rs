use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use tempfile::TempDir;

/// Materializes scratch input files for an end-to-end sharding run into a single
/// `TempDir`, the way the reference codebase's integration tests stage fixed file
/// contents before exercising a binary against them -- except here the contents are
/// built in-line rather than copied from a canned `tests/test-data/` tree, since the
/// inputs this crate reads are small, purpose-built byte layouts (VCF bodies, raw
/// mindex arrays) rather than real-world files.
pub struct Fixture {
    _tempdir: TempDir,
    root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tempdir = tempfile::tempdir().unwrap();
        let root = tempdir.path().to_path_buf();
        Self { _tempdir: tempdir, root }
    }

    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn write_text(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    pub fn write_mindex(&self, name: &str, entries: &[i64]) -> PathBuf {
        let path = self.path(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for &entry in entries {
            file.write_i64::<LittleEndian>(entry).unwrap();
        }
        path
    }

    pub fn mkdir(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[must_use]
    pub fn read_text(&self, path: impl AsRef<Path>) -> String {
        std::fs::read_to_string(path).unwrap()
    }
}
