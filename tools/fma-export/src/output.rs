//! Atomic file output

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Write `bytes` to `path` through a temporary file in the same directory.
///
/// The destination is only replaced once every byte has been written, so a
/// failed export never leaves a truncated file behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {:?}", dir))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {:?}", file.path()))?;
    file.as_file()
        .sync_all()
        .with_context(|| format!("Failed to flush {:?}", file.path()))?;
    file.persist(path)
        .with_context(|| format!("Failed to move output into place: {:?}", path))?;
    Ok(())
}
