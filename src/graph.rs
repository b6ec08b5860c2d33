//! Migration Dependency Graph
//!
//! Holds the loaded migration scripts as a directed graph (edges point from a
//! migration to the migrations it depends on) and produces the deterministic
//! dependency-respecting order the projection engine replays in.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{AuditError, AuditResult};
use crate::project::Operation;

/// Identity of a single migration: owning app plus migration name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MigrationId {
    pub app: String,
    pub name: String,
}

impl MigrationId {
    pub fn new(app: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.name)
    }
}

/// A migration script loaded from disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationScript {
    pub id: MigrationId,
    pub dependencies: Vec<MigrationId>,
    /// Migrations this script replaces (squash migrations)
    pub replaces: Vec<MigrationId>,
    pub operations: Vec<Operation>,
}

impl MigrationScript {
    pub fn new(id: MigrationId, dependencies: Vec<MigrationId>, operations: Vec<Operation>) -> Self {
        Self {
            id,
            dependencies,
            replaces: Vec::new(),
            operations,
        }
    }

    pub fn with_replaces(mut self, replaces: Vec<MigrationId>) -> Self {
        self.replaces = replaces;
        self
    }
}

/// Directed dependency graph over migration scripts
///
/// All internal storage is BTree-based so every accessor iterates in one
/// deterministic order: identical inputs always produce identical walks.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<MigrationId, MigrationScript>,
    /// node -> the nodes it depends on
    dependencies: BTreeMap<MigrationId, BTreeSet<MigrationId>>,
    /// node -> the nodes that depend on it
    dependents: BTreeMap<MigrationId, BTreeSet<MigrationId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a migration script and its dependency edges
    pub fn add_migration(&mut self, script: MigrationScript) {
        let id = script.id.clone();
        let deps: BTreeSet<MigrationId> = script.dependencies.iter().cloned().collect();

        for dep in &deps {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .insert(id.clone());
        }
        self.dependencies.insert(id.clone(), deps);
        self.dependents.entry(id.clone()).or_default();
        self.nodes.insert(id, script);
    }

    pub fn contains(&self, id: &MigrationId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up the script attached to a node
    pub fn migration(&self, id: &MigrationId) -> Option<&MigrationScript> {
        self.nodes.get(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &MigrationId> {
        self.nodes.keys()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every dependency edge must point at a loaded node
    pub fn validate(&self) -> AuditResult<()> {
        for (id, deps) in &self.dependencies {
            for dep in deps {
                if !self.nodes.contains_key(dep) {
                    return Err(AuditError::Script {
                        path: id.to_string(),
                        reason: format!("depends on unknown migration {}", dep),
                    });
                }
            }
        }
        Ok(())
    }

    /// Nodes no other migration depends on, in deterministic order
    pub fn leaf_nodes(&self) -> Vec<MigrationId> {
        self.dependents
            .iter()
            .filter(|(id, children)| children.is_empty() && self.nodes.contains_key(*id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Depth-first walk from `start` back toward its roots
    ///
    /// Returns the walk in dependency-last order: the start node first, every
    /// node before all of its own dependencies. Fails fast with
    /// [`AuditError::DependencyCycle`] when a walk revisits a node already on
    /// its current path.
    pub fn walk_from(&self, start: &MigrationId) -> AuditResult<Vec<MigrationId>> {
        let mut order: Vec<MigrationId> = Vec::new();
        let mut finished: BTreeSet<MigrationId> = BTreeSet::new();
        let mut on_path: BTreeSet<MigrationId> = BTreeSet::new();
        let mut stack: Vec<(MigrationId, bool)> = vec![(start.clone(), false)];

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                on_path.remove(&node);
                finished.insert(node.clone());
                order.push(node);
                continue;
            }
            if finished.contains(&node) {
                continue;
            }
            if on_path.contains(&node) {
                return Err(AuditError::DependencyCycle(node.to_string()));
            }

            on_path.insert(node.clone());
            stack.push((node.clone(), true));
            if let Some(deps) = self.dependencies.get(&node) {
                // Reversed push so dependencies are expanded in ascending order
                for dep in deps.iter().rev() {
                    stack.push((dep.clone(), false));
                }
            }
        }

        // The walk accumulates dependencies-first; flip it into the
        // dependency-last order this interface promises.
        order.reverse();
        Ok(order)
    }
}

/// All graph nodes in dependency-respecting order
///
/// Each leaf walk is flipped into dependency-first order before the walks are
/// unioned with first-encounter de-duplication. Unioning the unflipped walks
/// and reversing at the end would reorder shared ancestors behind nodes that
/// depend on them whenever two leaves share history.
pub fn ordered_nodes(graph: &DependencyGraph) -> AuditResult<Vec<MigrationId>> {
    let mut ordered: Vec<MigrationId> = Vec::new();
    let mut seen: BTreeSet<MigrationId> = BTreeSet::new();

    for leaf in graph.leaf_nodes() {
        let mut walk = graph.walk_from(&leaf)?;
        walk.reverse();
        for node in walk {
            if seen.insert(node.clone()) {
                ordered.push(node);
            }
        }
    }

    // A node no leaf walk reached sits behind a cycle; walking it surfaces
    // the cycle error instead of dropping the node from the order.
    if seen.len() != graph.node_count() {
        for node in graph.node_ids() {
            if !seen.contains(node) {
                graph.walk_from(node)?;
            }
        }
    }

    Ok(ordered)
}

/// Applied graph nodes in dependency-respecting order
///
/// Applied records that are not present in the graph are silently excluded
/// here; the missing-migrations rule reports them.
pub fn order_applied(
    graph: &DependencyGraph,
    applied: &BTreeSet<MigrationId>,
) -> AuditResult<Vec<MigrationId>> {
    let mut ordered = ordered_nodes(graph)?;
    ordered.retain(|node| applied.contains(node));
    Ok(ordered)
}
