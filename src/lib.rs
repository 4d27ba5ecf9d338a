//! Quickreload: hot module reloading for the Quicksilver runtime
//!
//! Edits to a running program's modules are picked up without restarting the
//! process. A change evicts the stale module, bubbles up the dependency graph
//! to the nearest modules that accepted updates (or have nothing above them),
//! re-requires those from their original requesters and patches exported
//! classes so existing instances run the new code.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::rc::Rc;
//! use quickreload::{FileLoader, FileWatcher, HotReloader};
//!
//! fn main() -> quickreload::Result<()> {
//!     let watcher = Rc::new(FileWatcher::default());
//!     let reloader = HotReloader::new(FileLoader::new(), Rc::clone(&watcher));
//!     reloader.require("./app.qr")?;
//!
//!     for change in watcher.poll() {
//!         reloader.handle_change(&change.path)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Reloading** | [`hmr`] |
//! | **Object model** | [`runtime`] |
//! | **Errors** | [`Error`], [`Result`] |
// type_complexity: store callbacks and module bodies are boxed closures
#![allow(clippy::type_complexity)]
#![allow(clippy::new_without_default)]

pub mod hmr;
pub mod runtime;

mod error;

pub use error::{messages, Error, ErrorKind, Result};
pub use hmr::{
    DependencyGraph, Eligibility, FileChange, FileChangeKind, FileLoader, FileWatcher, HotData,
    HotHandle, HotOptions, HotReloader, MemoryLoader, Module, ModuleId, ModuleLoader, ModuleScope,
    PatchHistory, Patchable, ReloadReport, Watcher,
};
pub use runtime::{NativeFn, Object, ObjectKind, Value};

/// Version of Quickreload
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
