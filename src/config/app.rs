// src/config/app.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::defaults::default_config;
use crate::consts::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, PENDING_KEY_SUFFIX};
use crate::core::scan::ExceptionSet;
use crate::core::util::{with_suffix, write_atomic};
use crate::error::{CoreError, Result};

/// Per-tree settings, stored next to the tree as `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    pub key_file: String,
    pub exceptions: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Json,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let parsed = match Format::of(path) {
            Format::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| CoreError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Load `path`, writing the default config there first if it does not exist
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config file not found, creating default");
            default_config().save(path)?;
        }
        Self::load(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = match Format::of(path) {
            Format::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
            Format::Toml => toml::to_string_pretty(self).map_err(|e| e.to_string()),
        }
        .map_err(|reason| CoreError::Config {
            path: path.to_path_buf(),
            reason,
        })?;
        write_atomic(path, text.as_bytes())
    }

    /// Key file location; relative names resolve against the working directory
    pub fn key_path(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(&self.key_file)
    }

    /// Where a new key goes while files still need the current one
    pub fn pending_key_path(&self, working_dir: &Path) -> PathBuf {
        with_suffix(&self.key_path(working_dir), PENDING_KEY_SUFFIX)
    }

    /// Configured exceptions plus the key file and its pending companion
    pub fn exception_set(&self) -> ExceptionSet {
        let mut set: ExceptionSet = self.exceptions.iter().cloned().collect();
        set.insert(self.key_file.clone());
        set.insert(format!("{}{PENDING_KEY_SUFFIX}", self.key_file));
        set
    }
}

/// Config file to use when none is given: `$EFT_CONFIG`, else `<working_dir>/config.json`
pub fn default_config_path(working_dir: &Path) -> PathBuf {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => working_dir.join(DEFAULT_CONFIG_FILE),
    }
}
