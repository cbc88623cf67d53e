// src/watch/watcher.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::{Result, RulewatchError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::dispatcher::{Dispatcher, FileChange};

/// Handle for the filesystem watcher.
///
/// Owns the underlying `RecommendedWatcher`; dropping this handle stops
/// file watching.
pub struct WatcherHandle {
    watcher: RecommendedWatcher,
    task: JoinHandle<Result<()>>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

impl WatcherHandle {
    /// Resolves only if watching fails; errors here are fatal.
    pub async fn wait(self) -> Result<()> {
        let WatcherHandle { watcher, task } = self;
        let result = match task.await {
            Ok(result) => result,
            Err(join) => Err(RulewatchError::Other(join.into())),
        };
        drop(watcher);
        result
    }
}

/// Watch the dispatcher's root recursively and dispatch every create,
/// write or remove of a non-directory path.
pub fn spawn_watcher(dispatcher: Arc<Dispatcher>) -> Result<WatcherHandle> {
    let root: PathBuf = dispatcher.root().clone();

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // Receiver gone means the watcher is shutting down.
            let _ = event_tx.send(res);
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(?root, "file watcher started");

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut dirs = DirIndex::scan(&root);
    let task = tokio::spawn(async move {
        while let Some(res) = event_rx.recv().await {
            let event = res?;
            if !is_content_change(&event.kind) {
                continue;
            }
            debug!(kind = ?event.kind, paths = ?event.paths, "received notify event");

            for path in event.paths {
                let change = FileChange {
                    is_dir: dirs.classify(&event.kind, &path, fs.as_ref()),
                    path,
                };
                dispatcher.dispatch(&change).await;
            }
        }
        debug!("watcher event loop finished");
        Ok(())
    });

    Ok(WatcherHandle { watcher, task })
}

/// Directories under the watch root, so removals can be recognised after
/// the directory is gone.
#[derive(Debug, Default)]
struct DirIndex {
    known: HashSet<PathBuf>,
}

impl DirIndex {
    fn scan(root: &Path) -> Self {
        let mut index = Self::default();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if entry.file_type().is_ok_and(|t| t.is_dir()) {
                    pending.push(entry.path());
                }
            }
            index.known.insert(dir);
        }
        debug!(dirs = index.known.len(), "indexed watched directories");
        index
    }

    /// Whether the event at `path` concerns a directory.
    ///
    /// The event kind decides when notify reports it; otherwise the path is
    /// checked on disk, and one that is no longer a directory is looked up
    /// in the index.
    fn classify(&mut self, kind: &EventKind, path: &Path, fs: &dyn FileSystem) -> bool {
        match kind {
            EventKind::Create(CreateKind::Folder) => {
                self.known.insert(path.to_path_buf());
                true
            }
            EventKind::Remove(RemoveKind::Folder) => {
                self.forget(path);
                true
            }
            EventKind::Create(CreateKind::File) | EventKind::Remove(RemoveKind::File) => false,
            EventKind::Remove(_) => {
                let was_dir = self.known.contains(path);
                self.forget(path);
                was_dir
            }
            _ => {
                if fs.is_dir(path) {
                    self.known.insert(path.to_path_buf());
                    return true;
                }
                let was_dir = self.known.contains(path);
                self.forget(path);
                was_dir
            }
        }
    }

    fn forget(&mut self, path: &Path) {
        self.known.retain(|p| !p.starts_with(path));
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}
