//! Key Rotation Orchestrator
//!
//! `rotate_key` is the two-phase protocol: decrypt the whole tree, then
//! encrypt it again under a new key. While it runs the tree is plaintext on
//! disk; a crash between or during the phases leaves data unencrypted with no
//! ciphertext to fall back on. Phase 2 also encrypts plaintext files that were
//! not encrypted before rotation started.
//!
//! `rotate_key_in_place` re-encrypts each ciphertext directly. Plaintext never
//! reaches the disk, and a crash exposes at most one file whose new ciphertext
//! sits next to its old IV.
//!
//! Neither strategy persists the new key. If rotation fails once files may be
//! under the new key, the error is `RotationIncomplete` carrying that key so
//! the caller can still store it.

use std::fs::File;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::core::batch::{decrypt_all, encrypt_all};
use crate::core::cipher::{decrypt_stream, EncryptWriter};
use crate::core::key::{generate_key, KeyMaterial};
use crate::core::scan::{scan_for_decryption, ExceptionSet, FileTask};
use crate::core::sidecar::stage_iv;
use crate::core::util::{persist, sync, temp_file_beside};
use crate::error::{CoreError, Result};

/// Decrypt everything under `old_key`, then encrypt everything under a new key
pub fn rotate_key(
    root: &Path,
    exceptions: &ExceptionSet,
    old_key: &KeyMaterial,
) -> Result<KeyMaterial> {
    warn!(root = %root.display(), "two-phase rotation: tree is plaintext until phase 2 completes");

    let restored = decrypt_all(root, exceptions, old_key, true)?;
    info!(files = restored.files, "rotation phase 1 (decrypt) complete");

    let new_key = generate_key();
    match encrypt_all(root, exceptions, &new_key, true) {
        Ok(summary) => {
            info!(files = summary.files, "rotation phase 2 (encrypt) complete");
            Ok(new_key)
        }
        Err(e) => {
            error!(error = %e, "rotation phase 2 failed; tree is partly under the new key");
            Err(CoreError::RotationIncomplete {
                new_key,
                source: Box::new(e),
            })
        }
    }
}

/// Re-encrypt every ciphertext under a new key without a plaintext stage
///
/// Files are handled in work-list order. On failure, files before the failing
/// one are under the new key and the rest are still under `old_key`.
pub fn rotate_key_in_place(
    root: &Path,
    exceptions: &ExceptionSet,
    old_key: &KeyMaterial,
) -> Result<KeyMaterial> {
    let work = scan_for_decryption(root, exceptions)?;
    info!(root = %root.display(), files = work.len(), "rotating key in place");

    let new_key = generate_key();
    for (done, task) in work.iter().enumerate() {
        if let Err(e) = rotate_file(task, old_key, &new_key) {
            if done == 0 {
                return Err(e);
            }
            error!(error = %e, rotated = done, "in-place rotation stopped part way");
            return Err(CoreError::RotationIncomplete {
                new_key,
                source: Box::new(e),
            });
        }
    }

    info!(files = work.len(), "in-place rotation complete");
    Ok(new_key)
}

/// Stream one ciphertext through decrypt and re-encrypt, then swap it in
fn rotate_file(task: &FileTask, old_key: &KeyMaterial, new_key: &KeyMaterial) -> Result<()> {
    let iv = task
        .iv
        .ok_or_else(|| CoreError::MissingIv(task.source.clone()))?;
    let mut input = File::open(&task.source).map_err(|e| CoreError::io(&task.source, e))?;

    let mut writer = EncryptWriter::new(temp_file_beside(&task.source)?, new_key);
    decrypt_stream(&mut input, &mut writer, old_key, &iv).map_err(|e| e.at(&task.source))?;
    let (new_iv, staged_ciphertext) = writer.finish().map_err(|e| e.at(&task.source))?;

    let staged_ciphertext = sync(staged_ciphertext)?;
    let staged_iv = stage_iv(&task.sidecar, &new_iv)?;
    drop(input);

    // single-file window: new ciphertext next to the old IV
    persist(staged_ciphertext, &task.source)?;
    persist(staged_iv, &task.sidecar)?;

    debug!(path = %task.source.display(), "rotated");
    Ok(())
}
