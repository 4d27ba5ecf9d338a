//! Reload propagation
//!
//! Starting from a changed module, walk up the dependants until every branch
//! ends in a module that either accepted updates or has nothing above it.
//! Those modules are the reload roots. Every module visited on the way is
//! stored, evicted and detached from its dependencies, at most once per
//! change event even in the presence of cycles and diamonds.

use std::collections::BTreeSet;

use tracing::trace;

use super::ModuleId;
use crate::error::Result;

/// Operations the propagation walk needs from the reload context
pub trait ReloadHost {
    /// Run the module's store callback so it can stash state
    fn run_store_callback(&self, id: &ModuleId) -> Result<()>;

    /// Drop the module from the module cache
    fn evict(&self, id: &ModuleId);

    /// Remove all outgoing dependency edges of `id`, unwatching every
    /// dependency that lost its last dependent; returns the unwatched ids
    fn detach_dependencies(&self, id: &ModuleId) -> Vec<ModuleId>;

    fn dependants_of(&self, id: &ModuleId) -> Vec<ModuleId>;

    fn is_accepted(&self, id: &ModuleId) -> bool;
}

/// Outcome of one propagation walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Reload roots, in discovery order
    pub acceptees: Vec<ModuleId>,
    /// Every module stored and evicted, in visit order
    pub evicted: Vec<ModuleId>,
    /// Dependencies that stopped being watched
    pub unwatched: Vec<ModuleId>,
}

/// Determine the reload roots for `changed`
///
/// Uses an explicit stack so deep dependency chains do not grow the call
/// stack. A failing store callback aborts the walk; modules already evicted
/// stay evicted and the failing module is evicted as well.
pub fn propagate<H: ReloadHost + ?Sized>(host: &H, changed: &ModuleId) -> Result<Propagation> {
    let mut outcome = Propagation::default();
    let mut visited: BTreeSet<ModuleId> = BTreeSet::new();
    let mut stack = vec![changed.clone()];

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }

        if let Err(e) = host.run_store_callback(&id) {
            host.evict(&id);
            return Err(e);
        }
        host.evict(&id);
        outcome.evicted.push(id.clone());
        outcome.unwatched.extend(host.detach_dependencies(&id));

        let dependants = host.dependants_of(&id);
        if host.is_accepted(&id) || dependants.is_empty() {
            trace!(module = %id, "reload root");
            outcome.acceptees.push(id);
            continue;
        }

        trace!(module = %id, dependants = dependants.len(), "bubbling reload to dependants");
        // Reverse so dependants are visited in their listed order
        for dependant in dependants.into_iter().rev() {
            if !visited.contains(&dependant) {
                stack.push(dependant);
            }
        }
    }

    Ok(outcome)
}
