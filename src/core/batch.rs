//! Batch Executor: run a Work List through the Cipher Transform
//!
//! Batches are fail-fast: the first failing file stops the batch. Files before
//! it are finished (outputs committed, sources deleted if requested). The
//! failing file keeps its source and loses only its temp output. Later files
//! are untouched. Running the same operation again picks up where it stopped,
//! since finished files no longer match the scan.
//!
//! Every output is written to a temp file beside its destination, synced and
//! renamed into place before the matching source is deleted.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::cipher::{Iv, Transform};
use crate::core::key::KeyMaterial;
use crate::core::scan::{scan_for_decryption, scan_for_encryption, ExceptionSet, FileTask, WorkList};
use crate::core::sidecar::write_iv;
use crate::core::util::{commit, remove_file, temp_file_beside};
use crate::error::{CoreError, Result};

/// Cooperative cancellation, checked between files and never mid-file
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Delete plaintext after encryption, or ciphertext + sidecar after decryption
    pub delete_source: bool,
    pub cancel: Option<CancelFlag>,
}

impl BatchOptions {
    pub fn deleting(delete_source: bool) -> Self {
        BatchOptions {
            delete_source,
            cancel: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub files: usize,
    /// Plaintext bytes processed
    pub bytes: u64,
}

/// Encrypt every eligible file under `root`
pub fn encrypt_all(
    root: &Path,
    exceptions: &ExceptionSet,
    key: &KeyMaterial,
    delete_original: bool,
) -> Result<BatchSummary> {
    encrypt_all_with(root, exceptions, key, &BatchOptions::deleting(delete_original))
}

pub fn encrypt_all_with(
    root: &Path,
    exceptions: &ExceptionSet,
    key: &KeyMaterial,
    opts: &BatchOptions,
) -> Result<BatchSummary> {
    let work = scan_for_encryption(root, exceptions)?.delete_sources(opts.delete_source);
    info!(root = %root.display(), files = work.len(), "encrypting tree");

    let (ivs, bytes) = encrypt_work_list(&work, key, opts.cancel.as_ref())?;
    check_counts(work.len(), ivs.len())?;

    info!(files = ivs.len(), bytes, "encryption complete");
    Ok(BatchSummary {
        files: ivs.len(),
        bytes,
    })
}

/// Decrypt every file under `root` that has an IV sidecar
pub fn decrypt_all(
    root: &Path,
    exceptions: &ExceptionSet,
    key: &KeyMaterial,
    delete_cipher: bool,
) -> Result<BatchSummary> {
    decrypt_all_with(root, exceptions, key, &BatchOptions::deleting(delete_cipher))
}

pub fn decrypt_all_with(
    root: &Path,
    exceptions: &ExceptionSet,
    key: &KeyMaterial,
    opts: &BatchOptions,
) -> Result<BatchSummary> {
    let work = scan_for_decryption(root, exceptions)?.delete_sources(opts.delete_source);
    info!(root = %root.display(), files = work.len(), "decrypting tree");

    let bytes = decrypt_work_list(&work, key, opts.cancel.as_ref())?;

    info!(files = work.len(), bytes, "decryption complete");
    Ok(BatchSummary {
        files: work.len(),
        bytes,
    })
}

/// Encrypt each task with one shared key configuration, returning the IVs in task order
pub fn encrypt_work_list(
    work: &WorkList,
    key: &KeyMaterial,
    cancel: Option<&CancelFlag>,
) -> Result<(Vec<Iv>, u64)> {
    let transform = Transform::new(key);
    let mut ivs = Vec::with_capacity(work.len());
    let mut bytes = 0;

    for task in work {
        check_cancel(cancel)?;
        let (iv, len) = encrypt_file(task, &transform)?;
        ivs.push(iv);
        bytes += len;
    }
    Ok((ivs, bytes))
}

pub fn decrypt_work_list(
    work: &WorkList,
    key: &KeyMaterial,
    cancel: Option<&CancelFlag>,
) -> Result<u64> {
    let transform = Transform::new(key);
    let mut bytes = 0;

    for task in work {
        check_cancel(cancel)?;
        bytes += decrypt_file(task, &transform)?;
    }
    Ok(bytes)
}

fn encrypt_file(task: &FileTask, transform: &Transform<'_>) -> Result<(Iv, u64)> {
    let mut input = File::open(&task.source).map_err(|e| CoreError::io(&task.source, e))?;
    let len = input
        .metadata()
        .map_err(|e| CoreError::io(&task.source, e))?
        .len();

    let mut tmp = temp_file_beside(&task.destination)?;
    let iv = transform
        .encrypt(&mut input, tmp.as_file_mut())
        .map_err(|e| e.at(&task.source))?;
    commit(tmp, &task.destination)?;
    write_iv(&task.sidecar, &iv)?;

    if task.delete_source {
        drop(input);
        remove_file(&task.source)?;
    }
    debug!(path = %task.source.display(), bytes = len, "encrypted");
    Ok((iv, len))
}

fn decrypt_file(task: &FileTask, transform: &Transform<'_>) -> Result<u64> {
    let iv = task
        .iv
        .ok_or_else(|| CoreError::MissingIv(task.source.clone()))?;
    let mut input = File::open(&task.source).map_err(|e| CoreError::io(&task.source, e))?;

    let mut tmp = temp_file_beside(&task.destination)?;
    transform
        .decrypt(&mut input, tmp.as_file_mut(), &iv)
        .map_err(|e| e.at(&task.source))?;
    let len = tmp
        .as_file()
        .metadata()
        .map_err(|e| CoreError::io(tmp.path(), e))?
        .len();
    commit(tmp, &task.destination)?;

    if task.delete_source {
        drop(input);
        // Sidecar first: a stray ciphertext without one is ignored by both scans
        remove_file(&task.sidecar)?;
        remove_file(&task.source)?;
    }
    debug!(path = %task.destination.display(), bytes = len, "decrypted");
    Ok(len)
}

/// IVs and tasks are parallel lists; any length difference is an internal bug
pub(crate) fn check_counts(tasks: usize, ivs: usize) -> Result<()> {
    if tasks != ivs {
        return Err(CoreError::CountMismatch { tasks, ivs });
    }
    Ok(())
}

fn check_cancel(cancel: Option<&CancelFlag>) -> Result<()> {
    match cancel {
        Some(flag) if flag.is_cancelled() => Err(CoreError::Cancelled),
        _ => Ok(()),
    }
}
