//! Tree Scanner: breadth-first walk producing a Work List
//!
//! Directories are visited level by level from the root. Within a directory
//! entries come in whatever order the filesystem yields them; no sort is
//! applied and nothing downstream depends on the order.
//!
//! Scans only enumerate and read; they never modify the tree.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::consts::{IV_SUFFIX, TEMP_PREFIX};
use crate::core::cipher::Iv;
use crate::core::sidecar::{
    ciphertext_path, is_artifact_name, plaintext_for_sidecar, read_iv, sidecar_path,
};
use crate::core::util::relative_path;
use crate::error::{CoreError, Result};

/// Tree-relative paths (`/`-separated) excluded from every operation
///
/// A directory entry excludes its whole subtree. Matching is exact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionSet(HashSet<String>);

impl ExceptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rel: impl Into<String>) -> bool {
        self.0.insert(rel.into())
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.0.contains(rel)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ExceptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ExceptionSet(iter.into_iter().map(Into::into).collect())
    }
}

impl From<HashSet<String>> for ExceptionSet {
    fn from(set: HashSet<String>) -> Self {
        ExceptionSet(set)
    }
}

/// One cipher operation: `source` is transformed into `destination`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// IV sidecar written (encryption) or consumed (decryption)
    pub sidecar: PathBuf,
    /// IV read from `sidecar`; only set on decryption tasks
    pub iv: Option<Iv>,
    pub delete_source: bool,
}

/// Ordered tasks from one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkList {
    tasks: Vec<FileTask>,
}

impl WorkList {
    pub fn tasks(&self) -> &[FileTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileTask> {
        self.tasks.iter()
    }

    /// Mark every task's source for deletion once its output is durable
    pub fn delete_sources(mut self, delete: bool) -> Self {
        for task in &mut self.tasks {
            task.delete_source = delete;
        }
        self
    }
}

impl<'a> IntoIterator for &'a WorkList {
    type Item = &'a FileTask;
    type IntoIter = std::slice::Iter<'a, FileTask>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}

/// Plaintext files under `root` that are not yet encrypted
pub fn scan_for_encryption(root: &Path, exceptions: &ExceptionSet) -> Result<WorkList> {
    let mut tasks = Vec::new();
    walk(root, exceptions, |file, name| {
        if is_artifact_name(name) {
            return Ok(());
        }
        if exceptions.contains(&relative_path(root, file)) {
            debug!(path = %file.display(), "excepted file");
            return Ok(());
        }
        tasks.push(FileTask {
            source: file.to_path_buf(),
            destination: ciphertext_path(file),
            sidecar: sidecar_path(file),
            iv: None,
            delete_source: false,
        });
        Ok(())
    })?;
    Ok(WorkList { tasks })
}

/// Encrypted files under `root`, found through their IV sidecars
///
/// A sidecar whose ciphertext is gone while the plaintext exists belongs to a
/// decryption that finished but was interrupted during cleanup; it is skipped.
pub fn scan_for_decryption(root: &Path, exceptions: &ExceptionSet) -> Result<WorkList> {
    let mut tasks = Vec::new();
    walk(root, exceptions, |file, name| {
        if !name.ends_with(IV_SUFFIX) {
            return Ok(());
        }
        let Some(plaintext) = plaintext_for_sidecar(file) else {
            return Ok(());
        };
        if exceptions.contains(&relative_path(root, &plaintext)) {
            debug!(path = %plaintext.display(), "excepted file");
            return Ok(());
        }
        let source = ciphertext_path(&plaintext);
        if !source.exists() && plaintext.exists() {
            warn!(path = %file.display(), "sidecar left over from a finished decryption, skipping");
            return Ok(());
        }
        let iv = read_iv(file)?;
        tasks.push(FileTask {
            source,
            destination: plaintext,
            sidecar: file.to_path_buf(),
            iv: Some(iv),
            delete_source: false,
        });
        Ok(())
    })?;
    Ok(WorkList { tasks })
}

/// Breadth-first walk calling `visit` for every regular file outside excepted
/// directories. Symlinks and other special entries are skipped.
fn walk<F>(root: &Path, exceptions: &ExceptionSet, mut visit: F) -> Result<()>
where
    F: FnMut(&Path, &str) -> Result<()>,
{
    let mut queue = VecDeque::from([root.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        if dir != root && exceptions.contains(&relative_path(root, &dir)) {
            debug!(path = %dir.display(), "excepted directory, skipping subtree");
            continue;
        }

        let scan_err = |path: &Path, source: std::io::Error| CoreError::Scan {
            path: path.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| scan_err(&dir, e))? {
            let entry = entry.map_err(|e| scan_err(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| scan_err(&path, e))?;
            if file_type.is_dir() {
                queue.push_back(path);
            } else if file_type.is_file() {
                files.push(path);
            } else {
                debug!(path = %path.display(), "not a regular file, skipping");
            }
        }

        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            visit(&file, &name)?;
        }
    }
    Ok(())
}
