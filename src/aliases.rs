// src/aliases.rs
//! Re-exports secure-gate's secret types
//!
//! The symmetric key is the only secret the tree engine holds in memory.

pub use secure_gate::{fixed_alias, random_alias, SecureRandomExt};

fixed_alias!(SymmetricKey32, 32); // 256-bit AES tree key

random_alias!(RandomSymmetricKey32, 32);
