// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
struct MockFile {
    content: String,
    modified: SystemTime,
}

/// In-memory filesystem with a read counter.
///
/// Every `add_file` / `touch` moves the file's modification time forward by
/// one second, so cache invalidation can be exercised deterministically.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockFile>>>,
    dirs: Arc<Mutex<HashSet<PathBuf>>>,
    clock: Arc<Mutex<SystemTime>>,
    reads: Arc<AtomicUsize>,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            dirs: Arc::new(Mutex::new(HashSet::new())),
            clock: Arc::new(Mutex::new(SystemTime::UNIX_EPOCH)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn tick(&self) -> SystemTime {
        let mut clock = self.clock.lock().unwrap();
        *clock += Duration::from_secs(1);
        *clock
    }

    /// Create or replace a file, advancing its modification time.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let modified = self.tick();
        self.files.lock().unwrap().insert(
            path.as_ref().to_path_buf(),
            MockFile {
                content: content.into(),
                modified,
            },
        );
    }

    /// Replace a file's content without touching its modification time.
    pub fn overwrite_keep_mtime(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        if let Some(file) = self.files.lock().unwrap().get_mut(path.as_ref()) {
            file.content = content.into();
        }
    }

    /// Advance a file's modification time without changing its content.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let modified = self.tick();
        if let Some(file) = self.files.lock().unwrap().get_mut(path.as_ref()) {
            file.modified = modified;
        }
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.dirs.lock().unwrap().insert(path.as_ref().to_path_buf());
    }

    /// Number of successful `read_to_string` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(file) => {
                self.reads.fetch_add(1, Ordering::SeqCst);
                Ok(file.content.clone())
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let files = self.files.lock().unwrap();
        files
            .get(path)
            .map(|f| f.modified)
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.lock().unwrap().contains(path)
    }
}
