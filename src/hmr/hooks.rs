//! Loader hooks and the reload context
//!
//! [`HotReloader`] owns everything hot reload needs for the lifetime of the
//! process: the module cache, dependency graph, registry, options and the
//! watch set. It wraps the two loader entry points:
//!
//! - executing a module attaches a [`HotHandle`] before the body runs and
//!   optionally patches exported classes afterwards;
//! - requiring a module records a dependency edge and arms a watch on the
//!   resolved file.
//!
//! All state sits behind `RefCell`s and no borrow is held while module code
//! or user callbacks run, so module bodies may require other modules and
//! reloads may re-enter the hooks freely. Everything runs on one thread.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::eligibility::Eligibility;
use super::graph::DependencyGraph;
use super::hot::HotHandle;
use super::options::HotOptions;
use super::propagate::{propagate, ReloadHost};
use super::registry::Registry;
use super::watcher::Watcher;
use super::ModuleId;
use crate::error::{Error, Result};
use crate::runtime::Value;

/// Resolution and execution of module bodies
///
/// The reload context decides *when* a module runs; implementations decide
/// where a specifier points and what running the body means.
pub trait ModuleLoader {
    /// Resolve a specifier to an absolute module id
    fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<ModuleId>;

    /// Run the body of `scope.id()`
    fn execute(&self, scope: &mut ModuleScope<'_>) -> Result<()>;
}

impl<T: ModuleLoader + ?Sized> ModuleLoader for Rc<T> {
    fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<ModuleId> {
        (**self).resolve(specifier, referrer)
    }

    fn execute(&self, scope: &mut ModuleScope<'_>) -> Result<()> {
        (**self).execute(scope)
    }
}

/// A cached module instance
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub exports: Value,
    hot: Option<HotHandle>,
}

impl Module {
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            exports: Value::new_object(),
            hot: None,
        }
    }

    /// Attach a hot handle unless one is already present
    pub fn attach_hot(&mut self, hot: HotHandle) -> bool {
        if self.hot.is_some() {
            return false;
        }
        self.hot = Some(hot);
        true
    }

    pub fn hot(&self) -> Option<&HotHandle> {
        self.hot.as_ref()
    }
}

/// Execution scope handed to a module body
pub struct ModuleScope<'a> {
    reloader: &'a HotReloader,
    id: ModuleId,
    hot: Option<HotHandle>,
    exports: Value,
}

impl<'a> ModuleScope<'a> {
    /// Id of the executing module
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Require another module on behalf of this one
    pub fn require(&self, specifier: &str) -> Result<Value> {
        self.reloader.require_from(Some(&self.id), specifier)
    }

    /// The `module.hot` handle; `None` for paths excluded from hot reload
    pub fn hot(&self) -> Option<&HotHandle> {
        self.hot.as_ref()
    }

    /// Current exports value
    pub fn exports(&self) -> Value {
        self.exports.clone()
    }

    /// Set a named export on the exports object
    pub fn export(&self, name: &str, value: Value) -> Result<()> {
        self.exports.set(name, value)
    }

    /// Replace the exports value entirely (`module.exports = ...`)
    pub fn set_exports(&mut self, value: Value) {
        self.exports = value.clone();
        self.reloader.update_exports(&self.id, value);
    }
}

/// Summary of one change-driven reload cycle
#[derive(Debug, Clone)]
pub struct ReloadReport {
    pub changed: ModuleId,
    /// Reload roots that were re-required
    pub acceptees: Vec<ModuleId>,
    /// Modules evicted from the cache
    pub evicted: Vec<ModuleId>,
    /// Paths that stopped being watched
    pub unwatched: Vec<ModuleId>,
    pub duration: Duration,
}

impl ReloadReport {
    fn skipped(changed: ModuleId) -> Self {
        Self {
            changed,
            acceptees: Vec::new(),
            evicted: Vec::new(),
            unwatched: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Whether anything was reloaded
    pub fn is_empty(&self) -> bool {
        self.acceptees.is_empty()
    }
}

/// Hot reload context
pub struct HotReloader {
    loader: Box<dyn ModuleLoader>,
    watcher: Box<dyn Watcher>,
    options: RefCell<HotOptions>,
    eligibility: RefCell<Eligibility>,
    cache: RefCell<BTreeMap<ModuleId, Module>>,
    graph: RefCell<DependencyGraph>,
    registry: RefCell<Registry>,
    watched: RefCell<BTreeSet<ModuleId>>,
}

impl std::fmt::Debug for HotReloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotReloader")
            .field("options", &self.options)
            .field("cache", &format!("<{} modules>", self.cache.borrow().len()))
            .field("graph", &self.graph)
            .field("registry", &self.registry)
            .field("watched", &self.watched)
            .finish()
    }
}

impl HotReloader {
    /// Create a context with default options
    pub fn new<L, W>(loader: L, watcher: W) -> Self
    where
        L: ModuleLoader + 'static,
        W: Watcher + 'static,
    {
        Self {
            loader: Box::new(loader),
            watcher: Box::new(watcher),
            options: RefCell::new(HotOptions::default()),
            eligibility: RefCell::new(Eligibility::default()),
            cache: RefCell::new(BTreeMap::new()),
            graph: RefCell::new(DependencyGraph::new()),
            registry: RefCell::new(Registry::new()),
            watched: RefCell::new(BTreeSet::new()),
        }
    }

    /// Create a context with the given options
    pub fn with_options<L, W>(loader: L, watcher: W, options: HotOptions) -> Result<Self>
    where
        L: ModuleLoader + 'static,
        W: Watcher + 'static,
    {
        let reloader = Self::new(loader, watcher);
        *reloader.eligibility.borrow_mut() = options.eligibility()?;
        *reloader.options.borrow_mut() = options;
        Ok(reloader)
    }

    /// Shallow-merge option overrides into the current options
    pub fn configure(&self, overrides: &serde_json::Value) -> Result<()> {
        let merged = self.options.borrow().merge(overrides)?;
        *self.eligibility.borrow_mut() = merged.eligibility()?;
        *self.options.borrow_mut() = merged;
        Ok(())
    }

    pub fn options(&self) -> HotOptions {
        self.options.borrow().clone()
    }

    /// Require an entry point from the top level
    pub fn require(&self, specifier: &str) -> Result<Value> {
        self.require_from(None, specifier)
    }

    /// Require hook: resolve, load if needed, then track the dependency
    pub fn require_from(&self, parent: Option<&ModuleId>, specifier: &str) -> Result<Value> {
        let id = self.loader.resolve(specifier, parent)?;
        self.require_resolved(parent, &id)
    }

    fn require_resolved(&self, parent: Option<&ModuleId>, id: &ModuleId) -> Result<Value> {
        let cached = self.cache.borrow().get(id).map(|m| m.exports.clone());
        let exports = match cached {
            Some(exports) => exports,
            None => self.load(id, parent)?,
        };

        if !self.eligibility.borrow().is_eligible(id.as_str()) {
            return Ok(exports);
        }
        if !self.cache.borrow().contains_key(id) {
            return Ok(exports);
        }

        // A dependent left evicted by a failed reload gets its edges on reload
        if let Some(parent) = parent.filter(|p| self.is_cached(p)) {
            if self.graph.borrow_mut().add_dependency(parent, id) {
                debug!(dependent = %parent, dependency = %id, "recorded dependency");
            }
        }
        self.watch(id);
        Ok(exports)
    }

    /// Load hook: cache a fresh module instance and run its body
    fn load(&self, id: &ModuleId, parent: Option<&ModuleId>) -> Result<Value> {
        let mut module = Module::new(id.clone());

        let hot = if self.eligibility.borrow().is_eligible(id.as_str()) {
            let entry = self.registry.borrow_mut().register_or_get(id);
            entry.borrow_mut().record_load(parent.cloned());
            let hot = HotHandle::new(entry);
            module.attach_hot(hot.clone());
            Some(hot)
        } else {
            None
        };

        let mut scope = ModuleScope {
            reloader: self,
            id: id.clone(),
            hot: hot.clone(),
            exports: module.exports.clone(),
        };
        // Cached before the body runs so cyclic requires see the partial exports
        self.cache.borrow_mut().insert(id.clone(), module);

        if let Err(e) = self.loader.execute(&mut scope) {
            self.cache.borrow_mut().remove(id);
            return Err(match e {
                Error::EvaluationError { .. } => e,
                other => Error::evaluation(id.as_str(), &other),
            });
        }

        let exports = scope.exports;
        if let Some(hot) = hot {
            if self.options.borrow().patch_exports {
                let patched = hot.patch_exports(&exports)?;
                if !patched.is_empty() {
                    debug!(module = %id, classes = ?patched, "patched exported classes");
                }
            }
        }
        Ok(exports)
    }

    fn update_exports(&self, id: &ModuleId, exports: Value) {
        if let Some(module) = self.cache.borrow_mut().get_mut(id) {
            module.exports = exports;
        }
    }

    fn watch(&self, id: &ModuleId) {
        if self.watched.borrow_mut().insert(id.clone()) {
            self.watcher.watch(id.as_path());
        }
    }

    fn unwatch(&self, id: &ModuleId) -> bool {
        let removed = self.watched.borrow_mut().remove(id);
        if removed {
            self.watcher.unwatch(id.as_path());
        }
        removed
    }

    /// Handle a change notification for `path`
    ///
    /// Paths that were never loaded are ignored. Every reload root is
    /// re-required from the module that originally required it; a failure
    /// there propagates and leaves the module evicted.
    pub fn handle_change(&self, path: &Path) -> Result<ReloadReport> {
        self.reload(ModuleId::from_path(path))
    }

    /// Force a reload cycle for `id` as if its file had changed
    pub fn invalidate(&self, id: &ModuleId) -> Result<ReloadReport> {
        self.reload(id.clone())
    }

    fn reload(&self, changed: ModuleId) -> Result<ReloadReport> {
        if !self.registry.borrow().contains(&changed) {
            debug!(module = %changed, "ignoring change to untracked module");
            return Ok(ReloadReport::skipped(changed));
        }

        let silent = self.options.borrow().silent;
        if !silent {
            info!(module = %changed, "change detected");
        }

        let start = Instant::now();
        let outcome = propagate(self, &changed)?;

        for acceptee in &outcome.acceptees {
            let (caller, target) = self.reload_target(acceptee);
            if !silent {
                info!(module = %acceptee, "reloading");
            }
            if target != *acceptee {
                debug!(module = %acceptee, via = %target, "requester is evicted, reloading from its ancestor");
            }
            if let Err(e) = self.require_resolved(caller.as_ref(), &target) {
                warn!(module = %target, error = %e, "reload failed, module left evicted");
                return Err(e);
            }
        }

        Ok(ReloadReport {
            changed,
            acceptees: outcome.acceptees,
            evicted: outcome.evicted,
            unwatched: outcome.unwatched,
            duration: start.elapsed(),
        })
    }

    fn owner_of(&self, id: &ModuleId) -> Option<ModuleId> {
        let entry = self.registry.borrow().get(id)?;
        let owner = entry.borrow().owner().cloned();
        owner
    }

    /// Module to re-require for `acceptee`, and the caller to require it from
    ///
    /// Normally the acceptee itself from its owner. When the owner is not
    /// cached the walk moves up the owner chain, so the evicted requesters
    /// are loaded again and pull the acceptee back in.
    fn reload_target(&self, acceptee: &ModuleId) -> (Option<ModuleId>, ModuleId) {
        let mut target = acceptee.clone();
        let mut seen = BTreeSet::from([target.clone()]);
        let mut caller = self.owner_of(&target);
        while let Some(owner) = caller.clone() {
            if self.is_cached(&owner) || !seen.insert(owner.clone()) {
                break;
            }
            caller = self.owner_of(&owner);
            target = owner;
        }
        (caller, target)
    }

    /// Whether a module instance is currently cached
    pub fn is_cached(&self, id: &ModuleId) -> bool {
        self.cache.borrow().contains_key(id)
    }

    /// Exports of a cached module
    pub fn exports(&self, id: &ModuleId) -> Option<Value> {
        self.cache.borrow().get(id).map(|m| m.exports.clone())
    }

    /// Cached module ids, in order
    pub fn cached_modules(&self) -> Vec<ModuleId> {
        self.cache.borrow().keys().cloned().collect()
    }

    /// Whether `id` is currently watched
    pub fn is_watched(&self, id: &ModuleId) -> bool {
        self.watched.borrow().contains(id)
    }

    /// Hot handle of a tracked module
    pub fn hot(&self, id: &ModuleId) -> Option<HotHandle> {
        self.registry.borrow().get(id).map(HotHandle::new)
    }

    /// Whether a tracked module has accepted updates
    pub fn is_accepted(&self, id: &ModuleId) -> bool {
        let entry = self.registry.borrow().get(id);
        entry.is_some_and(|entry| {
            let accepted = entry.borrow().is_accepted();
            accepted
        })
    }

    pub fn dependants_of(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.graph.borrow().dependants_of(id)
    }

    pub fn dependencies_of(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.graph.borrow().dependencies_of(id)
    }

    /// All dependency edges as (dependent, dependency) pairs
    pub fn edges(&self) -> Vec<(ModuleId, ModuleId)> {
        self.graph.borrow().edges()
    }
}

impl ReloadHost for HotReloader {
    fn run_store_callback(&self, id: &ModuleId) -> Result<()> {
        let callback = self
            .registry
            .borrow()
            .get(id)
            .map(|entry| {
                let callback = entry.borrow().store_callback();
                callback
            });
        match callback {
            Some(callback) => callback(),
            None => Ok(()),
        }
    }

    fn evict(&self, id: &ModuleId) {
        if self.cache.borrow_mut().remove(id).is_some() {
            debug!(module = %id, "evicted from module cache");
        }
    }

    fn detach_dependencies(&self, id: &ModuleId) -> Vec<ModuleId> {
        let orphaned = self.graph.borrow_mut().remove_dependencies(id);
        orphaned
            .into_iter()
            .filter(|dep| self.unwatch(dep))
            .collect()
    }

    fn dependants_of(&self, id: &ModuleId) -> Vec<ModuleId> {
        HotReloader::dependants_of(self, id)
    }

    fn is_accepted(&self, id: &ModuleId) -> bool {
        HotReloader::is_accepted(self, id)
    }
}
