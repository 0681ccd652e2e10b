// tests/common.rs
//! Shared test utilities: logging setup and tree builders
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use encrypted_file_tree::ExceptionSet;
use tempfile::{tempdir, TempDir};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Route `tracing` output through the test harness; respects RUST_LOG=
pub fn setup() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

/// A temporary tree seeded from `(relative path, contents)` pairs
pub struct Tree {
    pub dir: TempDir,
}

impl Tree {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempdir().unwrap();
        for (rel, contents) in files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
        Tree { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn read(&self, rel: &str) -> Vec<u8> {
        fs::read(self.path(rel)).unwrap()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Every regular file under the root, `/`-joined and sorted
    pub fn files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect(self.root(), self.root(), &mut out);
        out.sort();
        out
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            let rel = path.strip_prefix(root).unwrap();
            let parts: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
}

/// Two files to protect plus a key and config that stay untouched
pub fn sample_tree() -> Tree {
    Tree::new(&[
        ("a.txt", "hi"),
        ("sub/b.txt", "bye"),
        ("key", "placeholder"),
        ("config.json", "{}"),
    ])
}

pub fn sample_exceptions() -> ExceptionSet {
    ["key", "config.json"].into_iter().collect()
}
