// src/config/defaults.rs
use crate::config::app::Config;
use crate::consts::{DEFAULT_CONFIG_FILE, DEFAULT_KEY_FILE};

/// Key in `key`, with the key file and the config itself excluded from the tree
pub fn default_config() -> Config {
    Config {
        working_directory: None,
        key_file: DEFAULT_KEY_FILE.into(),
        exceptions: [DEFAULT_KEY_FILE, DEFAULT_CONFIG_FILE]
            .into_iter()
            .map(String::from)
            .collect(),
    }
}
