//! Persistent per-module reload state
//!
//! Entries are created lazily the first time an eligible path is loaded and
//! are never removed, so acceptance, stash and patch history survive any
//! number of evict/reload cycles of the same path.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::hot::HotData;
use super::patch::PatchHistory;
use super::ModuleId;
use crate::error::Result;

/// Zero-argument procedure run right before a module is evicted
pub type StoreCallback = Rc<dyn Fn() -> Result<()>>;

/// Reload state of a single module path
pub struct RegistryEntry {
    pub id: ModuleId,
    accepted: bool,
    stash: Option<HotData>,
    patch_history: PatchHistory,
    store_callback: StoreCallback,
    owner: Option<ModuleId>,
    version: u64,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("id", &self.id)
            .field("accepted", &self.accepted)
            .field("stash", &self.stash)
            .field("patch_history", &self.patch_history.names())
            .field("owner", &self.owner)
            .field("version", &self.version)
            .finish()
    }
}

impl RegistryEntry {
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            accepted: false,
            stash: None,
            patch_history: PatchHistory::new(),
            store_callback: Rc::new(|| Ok(())),
            owner: None,
            version: 0,
        }
    }

    /// Mark this module as its own reload boundary; never reset
    pub fn accept(&mut self) {
        self.accepted = true;
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn store_callback(&self) -> StoreCallback {
        Rc::clone(&self.store_callback)
    }

    pub fn set_store_callback(&mut self, callback: StoreCallback) {
        self.store_callback = callback;
    }

    pub fn set_stash(&mut self, data: HotData) {
        self.stash = Some(data);
    }

    /// Take the stash, leaving none behind
    pub fn take_stash(&mut self) -> Option<HotData> {
        self.stash.take()
    }

    pub fn has_stash(&self) -> bool {
        self.stash.is_some()
    }

    pub fn patch_history(&self) -> &PatchHistory {
        &self.patch_history
    }

    pub fn patch_history_mut(&mut self) -> &mut PatchHistory {
        &mut self.patch_history
    }

    /// Module that required this one on its most recent load
    ///
    /// `None` for entry points loaded from the top level.
    pub fn owner(&self) -> Option<&ModuleId> {
        self.owner.as_ref()
    }

    /// Record a fresh execution of the module body
    pub(crate) fn record_load(&mut self, owner: Option<ModuleId>) {
        self.owner = owner;
        self.version += 1;
    }

    /// Number of times the module body has run
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// All registry entries keyed by module path
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<ModuleId, Rc<RefCell<RegistryEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for `id`, creating it on first use
    pub fn register_or_get(&mut self, id: &ModuleId) -> Rc<RefCell<RegistryEntry>> {
        let entry = self
            .entries
            .entry(id.clone())
            .or_insert_with(|| Rc::new(RefCell::new(RegistryEntry::new(id.clone()))));
        Rc::clone(entry)
    }

    pub fn get(&self, id: &ModuleId) -> Option<Rc<RefCell<RegistryEntry>>> {
        self.entries.get(id).map(Rc::clone)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> Vec<ModuleId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
