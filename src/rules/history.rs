//! History rules: can the recorded migration history be trusted?

use serde_json::json;

use super::{HistoryRule, Severity, Violation};
use crate::history::MigrationHistory;

/// Every migration recorded as applied must have a script on disk
pub struct MissingMigrationFiles;

impl HistoryRule for MissingMigrationFiles {
    fn name(&self) -> &str {
        "missing_migrations"
    }

    fn description(&self) -> &str {
        "All migrations recorded as applied must have corresponding scripts on disk"
    }

    fn check(&self, history: &MigrationHistory) -> Vec<Violation> {
        history
            .missing()
            .iter()
            .map(|missing| {
                Violation::new(
                    self.name(),
                    Severity::Error,
                    format!(
                        "Migration {}.{} is recorded as applied but file is missing",
                        missing.app, missing.name
                    ),
                )
                .with_details(json!({ "app": missing.app, "name": missing.name }))
            })
            .collect()
    }
}

/// Migrations replaced by a squash should no longer be marked applied
pub struct SquashReplacementsApplied;

impl HistoryRule for SquashReplacementsApplied {
    fn name(&self) -> &str {
        "squash_replacements_applied"
    }

    fn description(&self) -> &str {
        "Squashed migrations must properly replace their original migrations"
    }

    fn check(&self, history: &MigrationHistory) -> Vec<Violation> {
        history
            .squash_replacements()
            .iter()
            .filter(|replaced| history.applied().contains(replaced))
            .map(|replaced| {
                Violation::new(
                    self.name(),
                    Severity::Warning,
                    format!(
                        "Migration {}.{} is replaced by a squash but still marked as applied",
                        replaced.app, replaced.name
                    ),
                )
                .with_details(json!({ "app": replaced.app, "name": replaced.name }))
            })
            .collect()
    }
}
