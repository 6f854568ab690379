//! Crash-safe file replacement

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces the file at `path` with `bytes` in one rename
///
/// The bytes go to a temporary file in the same directory, are synced and
/// then renamed over the target. A crash at any point leaves either the old
/// or the new file, never a truncated one. Missing parent directories are
/// created.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
