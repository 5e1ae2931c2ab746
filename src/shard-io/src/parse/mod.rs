use std::{fs, path::Path};

use located_error::LocatedError;

use anyhow::Result;

mod error;
pub use error::ParseError;

/// Attempt to create the parent directories of a path (if needed) and return an error if it failed.
pub fn create_parent_directory(path: &Path) -> Result<()> {
    use ParseError::CreateParentDirectory;
    let parent_dir = path.parent().unwrap_or(path);
    let loc_msg = || format!("While attempting to create output directory '{}'", path.display());
    fs::create_dir_all(parent_dir).map_err(CreateParentDirectory).with_loc(loc_msg)?;
    Ok(())
}

/// Fail fast on an unwriteable destination by writing (then immediately deleting) a single
/// probe byte. Cheaper than discovering the problem mid-copy, after other outputs may already
/// have been partially written.
pub fn probe_writable(path: &Path) -> Result<()> {
    let loc_msg = || format!("While probing '{}' for write access", path.display());
    create_parent_directory(path).with_loc(loc_msg)?;
    fs::write(path, [0u8])
        .map_err(|source| ParseError::NotWriteable { path: path.to_path_buf(), source })
        .with_loc(loc_msg)?;
    fs::remove_file(path).with_loc(loc_msg)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_writable_succeeds_on_fresh_path() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("nested").join("out.vcf");
        assert!(probe_writable(&path).is_ok());
        assert!(!path.exists(), "probe file must be cleaned up after the check");
    }

    #[test]
    fn probe_writable_fails_on_unwriteable_directory() {
        let path = Path::new("/proc/does-not-exist/out.vcf");
        assert!(probe_writable(path).is_err());
    }
}
