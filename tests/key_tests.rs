// tests/key_tests.rs
use std::fs;

use encrypted_file_tree::{
    generate_key, load_key, load_or_generate_key, store_key, CoreError, KeyMaterial,
};
use tempfile::tempdir;

mod common;

#[test]
fn test_generate_key_is_random_and_32_bytes() {
    common::setup();
    let key1 = generate_key();
    let key2 = generate_key();
    assert_eq!(key1.expose_secret().len(), 32);
    assert_ne!(key1, key2);
    assert_ne!(key1.expose_secret(), &[0u8; 32]);
}

#[test]
fn test_load_or_generate_creates_key_then_reloads_it() {
    common::setup();
    let dir = tempdir().unwrap();
    let path = dir.path().join("key");

    let created = load_or_generate_key(&path).unwrap();
    assert!(path.exists());

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.len(), 44, "32 bytes in standard base64");
    assert_eq!(KeyMaterial::from_base64(&text).unwrap(), created);

    let reloaded = load_or_generate_key(&path).unwrap();
    assert_eq!(reloaded, created);
}

#[test]
fn test_load_key_missing_file_is_key_not_found() {
    let dir = tempdir().unwrap();
    let result = load_key(dir.path().join("absent"));
    assert!(matches!(result, Err(CoreError::KeyNotFound(_))));
}

#[test]
fn test_load_key_rejects_wrong_length() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("key");
    // 16 bytes of base64
    fs::write(&path, "AAAAAAAAAAAAAAAAAAAAAA==").unwrap();

    let err = load_key(&path).unwrap_err();
    assert!(matches!(err, CoreError::MalformedKey { .. }));
    assert!(err.is_consistency_error());
}

#[test]
fn test_load_key_rejects_non_base64() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("key");
    fs::write(&path, "this is not a key at all!").unwrap();

    assert!(matches!(load_key(&path), Err(CoreError::MalformedKey { .. })));
}

#[test]
fn test_load_or_generate_does_not_replace_malformed_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("key");
    fs::write(&path, "garbage").unwrap();

    assert!(matches!(
        load_or_generate_key(&path),
        Err(CoreError::MalformedKey { .. })
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), "garbage");
}

#[test]
fn test_load_key_tolerates_trailing_newline() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("key");
    let key = KeyMaterial::from_bytes([0x42; 32]);
    fs::write(&path, format!("{}\n", key.to_base64())).unwrap();

    assert_eq!(load_key(&path).unwrap(), key);
}

#[test]
fn test_store_key_overwrites_existing_key() {
    common::setup();
    let dir = tempdir().unwrap();
    let path = dir.path().join("key");

    let old = load_or_generate_key(&path).unwrap();
    let new = generate_key();
    store_key(&path, &new).unwrap();

    let loaded = load_key(&path).unwrap();
    assert_eq!(loaded, new);
    assert_ne!(loaded, old);
}

#[test]
fn test_key_debug_is_redacted() {
    let key = KeyMaterial::from_bytes([0x42; 32]);
    let shown = format!("{key:?}");
    assert!(!shown.contains(&key.to_base64()));
    assert_eq!(
        key.to_base64(),
        "QkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkI="
    );
}
