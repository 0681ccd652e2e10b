//! Key Store: load, generate and persist the tree key
//!
//! The key file holds the base64 text of a 256-bit key and nothing else.

use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{info, warn};

use crate::aliases::{RandomSymmetricKey32, SecureRandomExt, SymmetricKey32};
use crate::consts::KEY_LEN;
use crate::core::util::{parent_dir, stage, sync_dir, write_atomic};
use crate::error::{CoreError, Result};

/// 256-bit tree key, zeroized on drop
pub struct KeyMaterial(SymmetricKey32);

impl KeyMaterial {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        KeyMaterial(SymmetricKey32::new(bytes))
    }

    /// Decode the key-file representation; surrounding whitespace is ignored
    pub fn from_base64(text: &str) -> std::result::Result<Self, String> {
        let decoded = STANDARD
            .decode(text.trim())
            .map_err(|e| format!("not valid base64: {e}"))?;
        let bytes: [u8; KEY_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| format!("expected {KEY_LEN} bytes, got {}", decoded.len()))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.expose_secret())
    }

    pub fn expose_secret(&self) -> &[u8; KEY_LEN] {
        self.0.expose_secret()
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.expose_secret() == other.expose_secret()
    }
}

impl Eq for KeyMaterial {}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Generate a new random 256-bit key
#[inline]
pub fn generate_key() -> KeyMaterial {
    KeyMaterial(SymmetricKey32::new(**RandomSymmetricKey32::new()))
}

/// Read the key at `path`; `KeyNotFound` if the file does not exist
pub fn load_key(path: impl AsRef<Path>) -> Result<KeyMaterial> {
    let path = path.as_ref();
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::KeyNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(CoreError::io(path, e)),
    };
    KeyMaterial::from_base64(&text).map_err(|reason| CoreError::MalformedKey {
        path: path.to_path_buf(),
        reason,
    })
}

/// Load the key at `path`, or generate and persist a new one if it is absent
///
/// The new key is written through a temp file and a no-clobber rename. If
/// another writer wins the race, its key is loaded instead of ours.
pub fn load_or_generate_key(path: impl AsRef<Path>) -> Result<KeyMaterial> {
    let path = path.as_ref();
    match load_key(path) {
        Err(CoreError::KeyNotFound(_)) => {}
        other => return other,
    }

    let key = generate_key();
    let staged = stage(path, key.to_base64().as_bytes())?;

    match staged.persist_noclobber(path) {
        Ok(_) => {
            sync_dir(parent_dir(path))?;
            info!(path = %path.display(), "generated new key file");
            Ok(key)
        }
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            warn!(path = %path.display(), "key file appeared concurrently, loading it");
            load_key(path)
        }
        Err(e) => Err(CoreError::io(path, e.error)),
    }
}

/// Atomically replace the key file with `key`
pub fn store_key(path: impl AsRef<Path>, key: &KeyMaterial) -> Result<()> {
    let path = path.as_ref();
    write_atomic(path, key.to_base64().as_bytes())?;
    info!(path = %path.display(), "stored key file");
    Ok(())
}
