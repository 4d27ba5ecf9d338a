//! Module dependency graph
//!
//! Edges point from a dependent to the dependency it obtained through a
//! require call. Both directions are indexed so reverse lookups during
//! reload propagation stay cheap. Ordered collections keep traversal order
//! deterministic.

use std::collections::{BTreeMap, BTreeSet};

use super::ModuleId;

/// Directed dependency graph between loaded modules
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Forward edges: dependent -> its dependencies
    dependencies: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    /// Reverse edges: dependency -> modules that depend on it
    dependants: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` required `dependency`
    ///
    /// Inserting an existing edge is a no-op. Cycles are allowed.
    pub fn add_dependency(&mut self, dependent: &ModuleId, dependency: &ModuleId) -> bool {
        let inserted = self
            .dependencies
            .entry(dependent.clone())
            .or_default()
            .insert(dependency.clone());
        if inserted {
            self.dependants
                .entry(dependency.clone())
                .or_default()
                .insert(dependent.clone());
        }
        inserted
    }

    /// Remove every outgoing edge of `dependent`
    ///
    /// Returns the dependencies that no longer have any dependent, in order.
    pub fn remove_dependencies(&mut self, dependent: &ModuleId) -> Vec<ModuleId> {
        let Some(deps) = self.dependencies.remove(dependent) else {
            return Vec::new();
        };

        let mut orphaned = Vec::new();
        for dep in deps {
            if let Some(parents) = self.dependants.get_mut(&dep) {
                parents.remove(dependent);
                if parents.is_empty() {
                    self.dependants.remove(&dep);
                    orphaned.push(dep);
                }
            }
        }
        orphaned
    }

    /// Every module with a live edge to `dependency`
    pub fn dependants_of(&self, dependency: &ModuleId) -> Vec<ModuleId> {
        self.dependants
            .get(dependency)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every module `dependent` currently depends on
    pub fn dependencies_of(&self, dependent: &ModuleId) -> Vec<ModuleId> {
        self.dependencies
            .get(dependent)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Check whether a specific edge exists
    pub fn contains_edge(&self, dependent: &ModuleId, dependency: &ModuleId) -> bool {
        self.dependencies
            .get(dependent)
            .is_some_and(|set| set.contains(dependency))
    }

    /// Whether any module still depends on `dependency`
    pub fn has_dependants(&self, dependency: &ModuleId) -> bool {
        self.dependants.contains_key(dependency)
    }

    /// All edges as (dependent, dependency) pairs, in order
    pub fn edges(&self) -> Vec<(ModuleId, ModuleId)> {
        self.dependencies
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.clone(), to.clone())))
            .collect()
    }

    /// Get edge count
    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(BTreeSet::len).sum()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
