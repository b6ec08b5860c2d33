//! Migration History
//!
//! The factual view of migration state assembled from the recorder table and
//! the on-disk scripts: what is applied, what exists on disk, what a squash
//! replaced, and the resolved forward plan. History rules read this view to
//! answer whether the recorded history can be trusted at all.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::graph::MigrationId;

/// Factual migration state from the recorder table and the loaded scripts
///
/// Fields are private so the view stays read-only after assembly; `missing`
/// is recomputed on every call rather than stored, so it can never drift from
/// the sets it is derived from.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationHistory {
    applied: BTreeSet<MigrationId>,
    on_disk: BTreeSet<MigrationId>,
    squash_replacements: BTreeSet<MigrationId>,
    forward_plan: Vec<MigrationId>,
}

impl MigrationHistory {
    pub fn new(
        applied: BTreeSet<MigrationId>,
        on_disk: BTreeSet<MigrationId>,
        squash_replacements: BTreeSet<MigrationId>,
        forward_plan: Vec<MigrationId>,
    ) -> Self {
        Self {
            applied,
            on_disk,
            squash_replacements,
            forward_plan,
        }
    }

    /// Migrations recorded as applied in the database
    pub fn applied(&self) -> &BTreeSet<MigrationId> {
        &self.applied
    }

    /// Migrations whose scripts exist on disk
    pub fn on_disk(&self) -> &BTreeSet<MigrationId> {
        &self.on_disk
    }

    /// Migrations named in some squash script's `replaces` list
    pub fn squash_replacements(&self) -> &BTreeSet<MigrationId> {
        &self.squash_replacements
    }

    /// Pending migrations in apply order
    pub fn forward_plan(&self) -> &[MigrationId] {
        &self.forward_plan
    }

    /// Applied migrations with no script on disk
    pub fn missing(&self) -> BTreeSet<MigrationId> {
        self.applied.difference(&self.on_disk).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(app: &str, name: &str) -> MigrationId {
        MigrationId::new(app, name)
    }

    fn set(ids: &[MigrationId]) -> BTreeSet<MigrationId> {
        ids.iter().cloned().collect()
    }

    #[test]
    fn test_missing_is_applied_minus_on_disk() {
        let history = MigrationHistory::new(
            set(&[id("shop", "0001_initial"), id("shop", "0002_add_price")]),
            set(&[id("shop", "0001_initial")]),
            BTreeSet::new(),
            vec![],
        );

        assert_eq!(history.missing(), set(&[id("shop", "0002_add_price")]));
    }

    #[test]
    fn test_missing_is_empty_when_disk_covers_applied() {
        let history = MigrationHistory::new(
            set(&[id("shop", "0001_initial")]),
            set(&[id("shop", "0001_initial"), id("shop", "0002_add_price")]),
            BTreeSet::new(),
            vec![id("shop", "0002_add_price")],
        );

        assert!(history.missing().is_empty());
        assert_eq!(history.forward_plan(), &[id("shop", "0002_add_price")]);
    }

    #[test]
    fn test_missing_is_recomputed_per_call() {
        let history = MigrationHistory::new(
            set(&[id("a", "0001_x"), id("b", "0001_y")]),
            set(&[id("a", "0001_x")]),
            BTreeSet::new(),
            vec![],
        );

        assert_eq!(history.missing(), history.missing());
        assert_eq!(history.missing().len(), 1);
    }
}
