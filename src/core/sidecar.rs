//! IV sidecar files and the artifact naming convention
//!
//! For a plaintext `a.txt` the ciphertext lives at `a.txt.gpg` and its IV,
//! base64 text with no header, at `a.txt.iv`.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::consts::{CIPHERTEXT_SUFFIX, IV_SUFFIX};
use crate::core::cipher::Iv;
use crate::core::util::{stage, strip_suffix, with_suffix, write_atomic};
use crate::error::{CoreError, Result};

pub fn ciphertext_path(plaintext: &Path) -> PathBuf {
    with_suffix(plaintext, CIPHERTEXT_SUFFIX)
}

pub fn sidecar_path(plaintext: &Path) -> PathBuf {
    with_suffix(plaintext, IV_SUFFIX)
}

/// Plaintext path a sidecar belongs to, if `sidecar` is named like one
pub fn plaintext_for_sidecar(sidecar: &Path) -> Option<PathBuf> {
    strip_suffix(sidecar, IV_SUFFIX)
}

/// True for names the engine itself produces: ciphertexts and sidecars
pub fn is_artifact_name(name: &str) -> bool {
    name.ends_with(CIPHERTEXT_SUFFIX) || name.ends_with(IV_SUFFIX)
}

pub fn read_iv(sidecar: &Path) -> Result<Iv> {
    let text = std::fs::read_to_string(sidecar).map_err(|e| CoreError::InvalidIv {
        path: sidecar.to_path_buf(),
        reason: e.to_string(),
    })?;
    Iv::from_base64(&text).map_err(|reason| CoreError::InvalidIv {
        path: sidecar.to_path_buf(),
        reason,
    })
}

/// Durably write `iv` to `sidecar`, replacing any previous IV
pub fn write_iv(sidecar: &Path, iv: &Iv) -> Result<()> {
    write_atomic(sidecar, iv.to_base64().as_bytes())
}

/// Synced temp copy of a new sidecar, for callers that rename it in themselves
pub(crate) fn stage_iv(sidecar: &Path, iv: &Iv) -> Result<NamedTempFile> {
    stage(sidecar, iv.to_base64().as_bytes())
}
