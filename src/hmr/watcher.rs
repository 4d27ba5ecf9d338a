//! File watching
//!
//! The reload core only ever adds and removes watch targets through the
//! [`Watcher`] trait; change notifications flow back in by calling
//! [`HotReloader::handle_change`](super::HotReloader::handle_change).
//! [`FileWatcher`] is a polling implementation based on modification times.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, SystemTime};

/// Watch target registry used by the reload core
pub trait Watcher {
    /// Start watching a file
    fn watch(&self, path: &Path);
    /// Stop watching a file
    fn unwatch(&self, path: &Path);
}

impl<T: Watcher + ?Sized> Watcher for Rc<T> {
    fn watch(&self, path: &Path) {
        (**self).watch(path)
    }

    fn unwatch(&self, path: &Path) {
        (**self).unwatch(path)
    }
}

/// File change event
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
    pub timestamp: SystemTime,
}

/// Type of file change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

/// Polling file watcher
#[derive(Debug)]
pub struct FileWatcher {
    watched_paths: RwLock<HashSet<PathBuf>>,
    poll_interval: Duration,
    file_timestamps: Mutex<HashMap<PathBuf, SystemTime>>,
}

impl FileWatcher {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            watched_paths: RwLock::new(HashSet::new()),
            poll_interval,
            file_timestamps: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a path is being watched
    pub fn is_watching<P: AsRef<Path>>(&self, path: P) -> bool {
        self.watched_paths.read().unwrap().contains(path.as_ref())
    }

    /// Number of watched paths
    pub fn len(&self) -> usize {
        self.watched_paths.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Poll for changes (should be called periodically)
    pub fn poll(&self) -> Vec<FileChange> {
        let paths = self.watched_paths.read().unwrap().clone();
        let mut timestamps = self.file_timestamps.lock().unwrap();
        let mut changes = Vec::new();

        for path in paths {
            let current_modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok();

            match (timestamps.get(&path), current_modified) {
                (Some(old), Some(new)) if new > *old => {
                    changes.push(FileChange {
                        path: path.clone(),
                        kind: FileChangeKind::Modified,
                        timestamp: new,
                    });
                    timestamps.insert(path, new);
                }
                (None, Some(new)) => {
                    changes.push(FileChange {
                        path: path.clone(),
                        kind: FileChangeKind::Created,
                        timestamp: new,
                    });
                    timestamps.insert(path, new);
                }
                (Some(_), None) => {
                    changes.push(FileChange {
                        path: path.clone(),
                        kind: FileChangeKind::Deleted,
                        timestamp: SystemTime::now(),
                    });
                    timestamps.remove(&path);
                }
                _ => {}
            }
        }

        changes.sort_by(|a, b| a.path.cmp(&b.path));
        changes
    }

    /// Get poll interval
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Watcher for FileWatcher {
    fn watch(&self, path: &Path) {
        let path = path.to_path_buf();
        let newly_watched = self.watched_paths.write().unwrap().insert(path.clone());

        // Keep the original baseline when a path is re-armed
        if newly_watched {
            if let Ok(modified) = std::fs::metadata(&path).and_then(|m| m.modified()) {
                self.file_timestamps.lock().unwrap().insert(path, modified);
            }
        }
    }

    fn unwatch(&self, path: &Path) {
        self.watched_paths.write().unwrap().remove(path);
        self.file_timestamps.lock().unwrap().remove(path);
    }
}

impl Default for FileWatcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(path: &Path, contents: &str) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "{}", contents).unwrap();
    }

    #[test]
    fn test_file_watcher() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.js");
        write_file(&file_path, "export value = 1");

        let watcher = FileWatcher::default();
        watcher.watch(&file_path);

        // Poll should return empty (no changes yet)
        assert!(watcher.poll().is_empty());

        // Modify file
        std::thread::sleep(Duration::from_millis(20));
        write_file(&file_path, "export value = 2");

        let changes = watcher.poll();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, FileChangeKind::Modified);
        assert_eq!(changes[0].path, file_path);
    }

    #[test]
    fn test_unwatch_stops_reporting() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("gone.js");
        write_file(&file_path, "export value = 1");

        let watcher = FileWatcher::default();
        watcher.watch(&file_path);
        assert!(watcher.is_watching(&file_path));

        watcher.unwatch(&file_path);
        assert!(!watcher.is_watching(&file_path));
        assert!(watcher.is_empty());

        std::thread::sleep(Duration::from_millis(20));
        write_file(&file_path, "export value = 2");
        assert!(watcher.poll().is_empty());
    }

    #[test]
    fn test_deleted_file_reported() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("deleted.js");
        write_file(&file_path, "export value = 1");

        let watcher = FileWatcher::default();
        watcher.watch(&file_path);
        std::fs::remove_file(&file_path).unwrap();

        let changes = watcher.poll();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, FileChangeKind::Deleted);
    }
}
