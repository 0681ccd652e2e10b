// src/core/mod.rs
//! The tree encryption engine
//!
//! Leaf-first: `key` and `cipher` know nothing about trees, `scan` builds work
//! lists, `batch` runs them, `rotate` composes batches.
//!
//! None of this is safe to run twice at once against the same tree. Scans
//! snapshot the tree and act on it afterwards, and key generation is only
//! guarded against clobbering, not against two processes using different keys.

pub mod batch;
pub mod cipher;
pub mod key;
pub mod rotate;
pub mod scan;
pub mod sidecar;
pub mod util;

pub use batch::*;
pub use cipher::*;
pub use key::*;
pub use rotate::*;
pub use scan::*;
pub use sidecar::*;

pub type Result<T> = std::result::Result<T, crate::error::CoreError>;
