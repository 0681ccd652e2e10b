// tests/rotate_tests.rs
use std::fs;
use std::io::Cursor;

use encrypted_file_tree::core::{decrypt_stream, read_iv};
use encrypted_file_tree::{
    decrypt_all, encrypt_all, generate_key, rotate_key, rotate_key_in_place, CoreError,
    ExceptionSet, KeyMaterial,
};

mod common;
use common::{sample_exceptions, sample_tree, Tree};

/// Decrypt one ciphertext with `key`; `None` when the padding check fails
fn try_decrypt(tree: &Tree, rel: &str, key: &KeyMaterial) -> Option<Vec<u8>> {
    let iv = read_iv(&tree.path(&format!("{rel}.iv"))).unwrap();
    let mut out = Vec::new();
    decrypt_stream(
        Cursor::new(tree.read(&format!("{rel}.gpg"))),
        &mut out,
        key,
        &iv,
    )
    .ok()
    .map(|_| out)
}

#[test]
fn test_rotate_key_reencrypts_tree_under_new_key() {
    common::setup();
    let tree = sample_tree();
    let exceptions = sample_exceptions();
    let old_key = generate_key();
    encrypt_all(tree.root(), &exceptions, &old_key, true).unwrap();
    let old_iv = read_iv(&tree.path("a.txt.iv")).unwrap();

    let new_key = rotate_key(tree.root(), &exceptions, &old_key).unwrap();

    assert_ne!(new_key, old_key);
    assert_ne!(read_iv(&tree.path("a.txt.iv")).unwrap(), old_iv);
    assert_eq!(
        tree.files(),
        [
            "a.txt.gpg",
            "a.txt.iv",
            "config.json",
            "key",
            "sub/b.txt.gpg",
            "sub/b.txt.iv"
        ]
    );
    assert_ne!(try_decrypt(&tree, "a.txt", &old_key).as_deref(), Some(&b"hi"[..]));

    decrypt_all(tree.root(), &exceptions, &new_key, true).unwrap();
    assert_eq!(tree.read("a.txt"), b"hi");
    assert_eq!(tree.read("sub/b.txt"), b"bye");
}

#[test]
fn test_rotate_key_also_encrypts_stray_plaintext() {
    let tree = Tree::new(&[("a.txt", "one")]);
    let old_key = generate_key();
    encrypt_all(tree.root(), &ExceptionSet::new(), &old_key, true).unwrap();
    fs::write(tree.path("late.txt"), "two").unwrap();

    let new_key = rotate_key(tree.root(), &ExceptionSet::new(), &old_key).unwrap();

    assert_eq!(try_decrypt(&tree, "late.txt", &new_key).unwrap(), b"two");
    assert!(!tree.exists("late.txt"));
}

#[test]
fn test_rotate_key_in_place_never_writes_plaintext() {
    common::setup();
    let tree = sample_tree();
    let exceptions = sample_exceptions();
    let old_key = generate_key();
    encrypt_all(tree.root(), &exceptions, &old_key, true).unwrap();
    let before = tree.files();

    let new_key = rotate_key_in_place(tree.root(), &exceptions, &old_key).unwrap();

    assert_ne!(new_key, old_key);
    assert_eq!(tree.files(), before);
    assert_eq!(try_decrypt(&tree, "a.txt", &new_key).unwrap(), b"hi");
    assert_eq!(try_decrypt(&tree, "sub/b.txt", &new_key).unwrap(), b"bye");
    assert_ne!(try_decrypt(&tree, "a.txt", &old_key).as_deref(), Some(&b"hi"[..]));
}

#[test]
fn test_rotate_key_in_place_leaves_plaintext_alone() {
    let tree = Tree::new(&[("a.txt", "one"), ("plain.txt", "two")]);
    let exceptions: ExceptionSet = ["plain.txt"].into_iter().collect();
    let old_key = generate_key();
    encrypt_all(tree.root(), &exceptions, &old_key, true).unwrap();

    rotate_key_in_place(tree.root(), &ExceptionSet::new(), &old_key).unwrap();

    assert_eq!(tree.read("plain.txt"), b"two");
    assert!(!tree.exists("plain.txt.gpg"));
}

#[test]
fn test_rotate_key_phase_one_failure_returns_plain_error() {
    let tree = Tree::new(&[("a.txt", "one")]);
    let old_key = generate_key();
    encrypt_all(tree.root(), &ExceptionSet::new(), &old_key, true).unwrap();
    fs::write(tree.path("a.txt.gpg"), b"short").unwrap();

    let err = rotate_key(tree.root(), &ExceptionSet::new(), &old_key).unwrap_err();

    // Nothing is under a new key yet, so no key is handed back
    assert!(matches!(err, CoreError::Crypto(_)));
    assert!(tree.exists("a.txt.iv"));
}

#[test]
fn test_in_place_failure_on_first_file_changes_nothing() {
    let tree = Tree::new(&[("a.txt", "one")]);
    let old_key = generate_key();
    encrypt_all(tree.root(), &ExceptionSet::new(), &old_key, true).unwrap();
    fs::write(tree.path("a.txt.gpg"), b"short").unwrap();
    let iv = read_iv(&tree.path("a.txt.iv")).unwrap();

    let err = rotate_key_in_place(tree.root(), &ExceptionSet::new(), &old_key).unwrap_err();

    assert!(matches!(err, CoreError::Crypto(_)));
    assert_eq!(tree.read("a.txt.gpg"), b"short");
    assert_eq!(read_iv(&tree.path("a.txt.iv")).unwrap(), iv);
}

#[test]
fn test_in_place_failure_after_progress_hands_back_new_key() {
    let tree = Tree::new(&[("a.txt", "one"), ("sub/b.txt", "two")]);
    let old_key = generate_key();
    encrypt_all(tree.root(), &ExceptionSet::new(), &old_key, true).unwrap();
    // Breadth-first: a.txt is rotated before sub/b.txt fails
    fs::write(tree.path("sub/b.txt.gpg"), b"short").unwrap();

    let err = rotate_key_in_place(tree.root(), &ExceptionSet::new(), &old_key).unwrap_err();

    match err {
        CoreError::RotationIncomplete { new_key, source } => {
            assert!(matches!(*source, CoreError::Crypto(_)));
            assert_eq!(try_decrypt(&tree, "a.txt", &new_key).unwrap(), b"one");
        }
        other => panic!("expected RotationIncomplete, got {other:?}"),
    }
}
