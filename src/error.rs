// src/error.rs
//! Public error type for the entire crate

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    // ── configuration / internal consistency ─────────────────────
    #[error("malformed key in {path}: {reason}")]
    MalformedKey { path: PathBuf, reason: String },

    #[error("key file not found: {0}")]
    KeyNotFound(PathBuf),

    #[error("work list has {tasks} task(s) but {ivs} IV(s) were produced")]
    CountMismatch { tasks: usize, ivs: usize },

    #[error("no IV recorded for {0}")]
    MissingIv(PathBuf),

    #[error("config error in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    // ── filesystem ───────────────────────────────────────────────
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot enumerate {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stream I/O error: {0}")]
    Stream(#[source] std::io::Error),

    #[error("invalid IV sidecar {path}: {reason}")]
    InvalidIv { path: PathBuf, reason: String },

    // ── cryptographic ────────────────────────────────────────────
    #[error("crypto operation failed: {0}")]
    Crypto(String),

    #[error("operation cancelled")]
    Cancelled,

    /// Some files are already encrypted under `new_key`; it must be persisted
    #[error("key rotation did not finish: {source}")]
    RotationIncomplete {
        new_key: crate::core::key::KeyMaterial,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the file a streaming error belongs to
    pub(crate) fn at(self, path: &std::path::Path) -> Self {
        match self {
            CoreError::Stream(source) => CoreError::io(path, source),
            CoreError::Crypto(reason) => CoreError::Crypto(format!("{}: {reason}", path.display())),
            other => other,
        }
    }

    /// True for errors that abort an operation before any file is touched.
    pub fn is_consistency_error(&self) -> bool {
        matches!(
            self,
            CoreError::MalformedKey { .. }
                | CoreError::KeyNotFound(_)
                | CoreError::CountMismatch { .. }
                | CoreError::MissingIv(_)
                | CoreError::Config { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
