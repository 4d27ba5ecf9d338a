//! Hot Module Reloading
//!
//! Update code without restarting the process. When a watched file changes,
//! the stale module is evicted, the smallest set of modules whose identity
//! must change is re-required from their original requesters, and classes
//! exported under a known name are patched so existing instances pick up the
//! new behavior.
//!
//! The pieces, leaf first:
//!
//! | Module | Role |
//! |--------|------|
//! | [`eligibility`] | which resolved paths take part in hot reload |
//! | [`graph`] | "A required B" edges, forward and reverse |
//! | [`registry`] | persistent per-path reload state |
//! | [`hot`] | the `module.hot` handle and stash data |
//! | [`patch`] | class identity reconciliation |
//! | [`propagate`] | picks the reload roots for a changed module |
//! | [`hooks`] | wraps module loading and requiring, drives reloads |
//! | [`loader`] | reference module loaders |
//! | [`watcher`] | watch target registry and a polling watcher |
//!
//! # Example
//! ```text
//! // In widget.js
//! class Widget { render() { return 'v2'; } }
//! module.hot.accept();
//! module.hot.patch(Widget);
//! module.exports = { Widget };
//! ```

pub mod eligibility;
pub mod graph;
pub mod hooks;
pub mod hot;
pub mod loader;
pub mod options;
pub mod patch;
pub mod propagate;
pub mod registry;
pub mod watcher;

use std::path::Path;

pub use eligibility::Eligibility;
pub use graph::DependencyGraph;
pub use hooks::{HotReloader, Module, ModuleLoader, ModuleScope, ReloadReport};
pub use hot::{HotData, HotHandle};
pub use loader::{FileLoader, MemoryLoader};
pub use options::HotOptions;
pub use patch::{PatchHistory, Patchable};
pub use propagate::{propagate, Propagation, ReloadHost};
pub use registry::{Registry, RegistryEntry};
pub use watcher::{FileChange, FileChangeKind, FileWatcher, Watcher};

/// Module identifier: the canonical absolute path of a loaded module
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModuleId(pub String);

impl ModuleId {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self(path.as_ref().to_string_lossy().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
