// src/lib.rs
//! encrypted-file-tree: encrypt every file under a directory with one key
//!
//! Features:
//! - AES-256-CBC streaming encryption, one random IV per file
//! - IV sidecars (`<file>.iv`) next to each ciphertext (`<file>.gpg`)
//! - Exception sets for files and whole subtrees
//! - Two-phase and in-place key rotation
//!
//! There is no integrity protection: ciphertexts are not authenticated.

pub mod aliases;
pub mod config;
pub mod consts;
pub mod core;
pub mod error;

// Re-export everything users need at the crate root
pub use config::{default_config_path, Config};
pub use core::{
    decrypt_all, decrypt_all_with, encrypt_all, encrypt_all_with, generate_key, load_key,
    load_or_generate_key, rotate_key, rotate_key_in_place, scan_for_decryption,
    scan_for_encryption, store_key, BatchOptions, BatchSummary, CancelFlag, ExceptionSet,
    FileTask, Iv, KeyMaterial, Result as CoreResult, WorkList,
};
pub use error::CoreError;
