//! Module hot handle (available to module code as `module.hot`)
//!
//! # Example
//! ```text
//! // In counter.js
//! let counter = 0;
//!
//! module.hot.accept();
//! module.hot.store((data) => {
//!   data.counter = counter;
//! });
//! module.hot.restore((data) => {
//!   counter = data.counter;
//! });
//! ```

use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::registry::RegistryEntry;
use super::ModuleId;
use crate::error::{Error, Result};
use crate::runtime::Value;

/// State that can be preserved across module updates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotData {
    data: HashMap<String, Vec<u8>>,
}

impl HotData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: serde::Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)
            .map_err(|e| Error::SerializationError(e.to_string()))?;
        self.data.insert(key.to_string(), bytes);
        Ok(())
    }

    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if let Some(bytes) = self.data.get(key) {
            let value = bincode::deserialize(bytes)
                .map_err(|e| Error::SerializationError(e.to_string()))?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    pub fn set_raw(&mut self, key: &str, data: Vec<u8>) {
        self.data.insert(key.to_string(), data);
    }

    pub fn get_raw(&self, key: &str) -> Option<&Vec<u8>> {
        self.data.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.data.remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-load control object
///
/// A new handle is created every time a module body executes, but every
/// handle for the same path writes into the same persistent registry entry.
#[derive(Clone)]
pub struct HotHandle {
    id: ModuleId,
    entry: Rc<RefCell<RegistryEntry>>,
}

impl std::fmt::Debug for HotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotHandle")
            .field("id", &self.id)
            .field("accepted", &self.entry.borrow().is_accepted())
            .finish()
    }
}

impl HotHandle {
    pub(crate) fn new(entry: Rc<RefCell<RegistryEntry>>) -> Self {
        let id = entry.borrow().id.clone();
        Self { id, entry }
    }

    /// Module this handle belongs to
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Declare this module a reload boundary
    pub fn accept(&self) {
        self.entry.borrow_mut().accept();
    }

    /// Whether this module has accepted updates
    pub fn is_accepted(&self) -> bool {
        self.entry.borrow().is_accepted()
    }

    /// Register a handler that saves state right before the module is evicted
    ///
    /// The handler receives a fresh, empty [`HotData`]; whatever it writes
    /// becomes the stash for the next load of this module.
    pub fn store<F>(&self, handler: F)
    where
        F: Fn(&mut HotData) -> Result<()> + 'static,
    {
        let entry: Weak<RefCell<RegistryEntry>> = Rc::downgrade(&self.entry);
        self.entry
            .borrow_mut()
            .set_store_callback(Rc::new(move || {
                let mut data = HotData::new();
                handler(&mut data)?;
                if let Some(entry) = entry.upgrade() {
                    entry.borrow_mut().set_stash(data);
                }
                Ok(())
            }));
    }

    /// Hand the stash saved by the previous load to `handler`, at most once
    ///
    /// Returns whether a stash was delivered.
    pub fn restore<F>(&self, handler: F) -> Result<bool>
    where
        F: FnOnce(&HotData) -> Result<()>,
    {
        let stash = self.entry.borrow_mut().take_stash();
        match stash {
            Some(data) => {
                handler(&data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reconcile the given classes with every earlier identity of their names
    pub fn patch(&self, constructors: &[Value]) -> Result<Vec<String>> {
        self.entry.borrow_mut().patch_history_mut().patch(constructors)
    }

    /// Patch the constructor-like parts of an export value
    pub fn patch_exports(&self, exports: &Value) -> Result<Vec<String>> {
        self.entry
            .borrow_mut()
            .patch_history_mut()
            .patch_exports(exports)
    }

    /// Number of times this module has been executed
    pub fn version(&self) -> u64 {
        self.entry.borrow().version()
    }
}
