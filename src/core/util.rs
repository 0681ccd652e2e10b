//! Small filesystem helpers shared by the core modules
//!
//! Everything that replaces a file on disk goes through `commit` (or `sync`
//! then `persist`), so a destination only ever holds fully written and synced
//! content. On Unix the containing directory is synced after each rename;
//! elsewhere the rename's durability is up to the filesystem.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::consts::TEMP_PREFIX;
use crate::error::{CoreError, Result};

/// `path` with `suffix` appended to its final component (`a.txt` → `a.txt.iv`)
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Inverse of `with_suffix`; `None` if the file name does not end in `suffix`
pub fn strip_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let base = name.strip_suffix(suffix)?;
    if base.is_empty() {
        return None;
    }
    Some(path.with_file_name(base))
}

/// Path of `path` relative to `root`, components joined with `/`
///
/// This is the form exception sets are written in. The root itself maps to "".
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Temp file in the same directory as `dest`, so the final rename stays on one filesystem
pub(crate) fn temp_file_beside(dest: &Path) -> Result<NamedTempFile> {
    let dir = parent_dir(dest);
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| CoreError::io(dir, e))
}

/// fsync the temp file and rename it over `dest`
pub(crate) fn commit(tmp: NamedTempFile, dest: &Path) -> Result<()> {
    let tmp = sync(tmp)?;
    persist(tmp, dest)
}

pub(crate) fn sync(mut tmp: NamedTempFile) -> Result<NamedTempFile> {
    tmp.flush().map_err(|e| CoreError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CoreError::io(tmp.path(), e))?;
    Ok(tmp)
}

/// Rename an already synced temp file over `dest`, then sync the directory
/// so the rename is durable before any caller deletes a source
pub(crate) fn persist(tmp: NamedTempFile, dest: &Path) -> Result<()> {
    tmp.persist(dest).map_err(|e| CoreError::io(dest, e.error))?;
    sync_dir(parent_dir(dest))
}

#[cfg(unix)]
pub(crate) fn sync_dir(dir: &Path) -> Result<()> {
    std::fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| CoreError::io(dir, e))
}

// Directory handles cannot be synced here; renames rely on the filesystem
#[cfg(not(unix))]
pub(crate) fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Atomically replace `dest` with `contents`
pub(crate) fn write_atomic(dest: &Path, contents: &[u8]) -> Result<()> {
    persist(stage(dest, contents)?, dest)
}

/// Write `contents` to a synced temp file beside `dest` without replacing it yet
pub(crate) fn stage(dest: &Path, contents: &[u8]) -> Result<NamedTempFile> {
    let mut tmp = temp_file_beside(dest)?;
    tmp.write_all(contents)
        .map_err(|e| CoreError::io(tmp.path(), e))?;
    sync(tmp)
}

pub(crate) fn remove_file(path: &Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|e| CoreError::io(path, e))
}
