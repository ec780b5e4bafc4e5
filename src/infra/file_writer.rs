// ============================================================
// Layer 6 — Output Writer
// ============================================================
// Writes rewritten issue lists back to disk.
//
// In-place rewrites are atomic: the new text goes to a temp
// file in the same directory, which is then renamed over the
// target. A reader never sees a half-written file, and a crash
// leaves the original intact.
//
// Unless told otherwise, the original is first copied to
// `<file>.bak`.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// Path of the backup copy for `path` (`issues.txt` → `issues.txt.bak`).
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Copy `path` to its `.bak` sibling, overwriting an older backup.
pub fn backup(path: &Path) -> Result<PathBuf> {
    let bak = backup_path(path);
    fs::copy(path, &bak)
        .with_context(|| format!("Cannot back up '{}' to '{}'", path.display(), bak.display()))?;
    tracing::info!("Backup written to {}", bak.display());
    Ok(bak)
}

/// Replace the contents of `path` with `text` atomically.
pub fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create temp file in '{}'", dir.display()))?;
    tmp.write_all(text.as_bytes())
        .with_context(|| format!("Cannot write temp file for '{}'", path.display()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Cannot replace '{}'", path.display()))?;

    tracing::debug!("Wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}

/// Write `text` to `path`, backing up any existing file first
/// when `keep_backup` is set.
pub fn write_output(path: &Path, text: &str, keep_backup: bool) -> Result<()> {
    if keep_backup && path.exists() {
        backup(path)?;
    }
    write_atomic(path, text)
}
