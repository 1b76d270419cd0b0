#![allow(dead_code)]

use arbor_core::{FileSystem, FolderCreateMode, FsConfig};
use arbor_providers::{LocalBackend, MemoryBackend};
use std::sync::Arc;
use tempfile::TempDir;

/// A filesystem under test. Keeps the temp dir of a local backend alive.
pub struct Fixture {
    pub label: &'static str,
    pub fs: FileSystem,
    _dir: Option<TempDir>,
}

pub fn local(config: FsConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(LocalBackend::new("local", dir.path()));
    Fixture {
        label: "local",
        fs: FileSystem::with_config(backend, config),
        _dir: Some(dir),
    }
}

pub fn memory(config: FsConfig) -> Fixture {
    Fixture {
        label: "memory",
        fs: FileSystem::with_config(Arc::new(MemoryBackend::new("mem")), config),
        _dir: None,
    }
}

/// Run `check` once against every bundled backend.
pub fn each_backend(config: FsConfig, check: impl Fn(&FileSystem)) {
    init_tracing();
    for fixture in [local(config.clone()), memory(config)] {
        tracing::info!(backend = fixture.label, "running against backend");
        check(&fixture.fs);
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn write(fs: &FileSystem, path: &str, content: &str) {
    let file = fs.file(path);
    if let Some(parent) = arbor_core::FsNode::parent(&file) {
        parent.create(FolderCreateMode::IncludingParents).unwrap();
    }
    file.write_bytes(content.as_bytes()).unwrap();
}

pub fn read(fs: &FileSystem, path: &str) -> String {
    String::from_utf8(fs.file(path).read_to_vec().unwrap()).unwrap()
}

/// `/src/a.txt` = "hi", `/src/sub/b.txt` = "yo"
pub fn seed_src(fs: &FileSystem) {
    write(fs, "/src/a.txt", "hi");
    write(fs, "/src/sub/b.txt", "yo");
}
