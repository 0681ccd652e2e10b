// src/config/mod.rs
//! Configuration for a protected tree
//!
//! JSON by default (`config.json`), TOML when the file name ends in `.toml`.

pub use app::{default_config_path, Config};
pub use defaults::default_config;

mod app;
mod defaults;
