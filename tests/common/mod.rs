//! Shared test helpers for integration tests

use quickreload::{HotReloader, MemoryLoader, ModuleId, Watcher};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Watch call observed by [`RecordingWatcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCall {
    Watch(PathBuf),
    Unwatch(PathBuf),
}

/// Watcher that records every call and the current watch set
#[derive(Debug, Default)]
pub struct RecordingWatcher {
    calls: RefCell<Vec<WatchCall>>,
    watched: RefCell<BTreeSet<PathBuf>>,
}

#[allow(dead_code)]
impl RecordingWatcher {
    pub fn calls(&self) -> Vec<WatchCall> {
        self.calls.borrow().clone()
    }

    pub fn is_watching(&self, path: &str) -> bool {
        self.watched.borrow().contains(Path::new(path))
    }

    pub fn unwatch_count(&self, path: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| **call == WatchCall::Unwatch(PathBuf::from(path)))
            .count()
    }

    pub fn watch_count(&self, path: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| **call == WatchCall::Watch(PathBuf::from(path)))
            .count()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl Watcher for RecordingWatcher {
    fn watch(&self, path: &Path) {
        self.calls.borrow_mut().push(WatchCall::Watch(path.to_path_buf()));
        self.watched.borrow_mut().insert(path.to_path_buf());
    }

    fn unwatch(&self, path: &Path) {
        self.calls.borrow_mut().push(WatchCall::Unwatch(path.to_path_buf()));
        self.watched.borrow_mut().remove(path);
    }
}

/// A reloader over an in-memory loader and a recording watcher
pub struct Harness {
    pub loader: Rc<MemoryLoader>,
    pub watcher: Rc<RecordingWatcher>,
    pub reloader: HotReloader,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        let loader = Rc::new(MemoryLoader::new());
        let watcher = Rc::new(RecordingWatcher::default());
        let reloader = HotReloader::new(Rc::clone(&loader), Rc::clone(&watcher));
        Self {
            loader,
            watcher,
            reloader,
        }
    }

    /// Simulate a save of `path`
    pub fn change(&self, path: &str) -> quickreload::Result<quickreload::ReloadReport> {
        self.reloader.handle_change(Path::new(path))
    }
}

/// Shorthand for a module id
#[allow(dead_code)]
pub fn id(path: &str) -> ModuleId {
    ModuleId::from(path)
}

/// Sorted list of module ids
#[allow(dead_code)]
pub fn ids(paths: &[&str]) -> Vec<ModuleId> {
    paths.iter().map(|p| ModuleId::from(*p)).collect()
}
