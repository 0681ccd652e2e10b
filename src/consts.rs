// src/consts.rs
//! Shared constants: on-disk layout and cipher parameters

/// Suffix appended to a plaintext path to name its ciphertext
pub const CIPHERTEXT_SUFFIX: &str = ".gpg";

/// Suffix appended to a plaintext path to name its IV sidecar
pub const IV_SUFFIX: &str = ".iv";

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// AES block length, which is also the CBC IV length
pub const BLOCK_LEN: usize = 16;

/// Streaming buffer size; must be a multiple of `BLOCK_LEN`
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Default config file name inside the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default key file name, relative to the working directory
pub const DEFAULT_KEY_FILE: &str = "key";

/// Appended to the key file name for a key that could not replace it yet
pub const PENDING_KEY_SUFFIX: &str = ".new";

/// Env var naming the config file when none is passed on the command line
pub const CONFIG_ENV_VAR: &str = "EFT_CONFIG";

const _: () = assert!(CHUNK_SIZE % BLOCK_LEN == 0);

/// Prefix of the temp files written next to their destination
pub const TEMP_PREFIX: &str = ".eft-";
