//! Audit Rules
//!
//! Rules are the verification layer of the audit. Two families exist:
//!
//! - **History rules** verify migration history against migration code:
//!   can the recorded history be trusted at all?
//! - **Schema rules** verify the expected schema (projected from migration
//!   operations) against the actual schema introspected from the database:
//!   does reality match what the migrations promise?
//!
//! Rules never mutate their inputs and never fail on well-formed inputs;
//! everything they have to say comes back as [`Violation`]s. Custom rules
//! implement [`HistoryRule`] or [`SchemaRule`] and register on the
//! [`RuleRegistry`].

pub mod columns;
pub mod constraints;
pub mod history;
pub mod tables;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::AuditConfig;
use crate::history::MigrationHistory;
use crate::schema::Schema;

/// Severity levels for rule violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A single rule violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Violation {
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.severity.as_str().to_uppercase(),
            self.rule,
            self.message
        )
    }
}

/// A rule over the migration history view
pub trait HistoryRule {
    /// Stable rule identifier
    fn name(&self) -> &str;
    /// What this rule checks
    fn description(&self) -> &str;
    fn check(&self, history: &MigrationHistory) -> Vec<Violation>;
}

/// A rule comparing the expected schema against the actual schema
pub trait SchemaRule {
    /// Stable rule identifier
    fn name(&self) -> &str;
    /// What this rule checks
    fn description(&self) -> &str;
    fn check(&self, expected: &Schema, actual: &Schema) -> Vec<Violation>;
}

/// Registry of all rules an audit runs
pub struct RuleRegistry {
    history_rules: Vec<Box<dyn HistoryRule + Send + Sync>>,
    schema_rules: Vec<Box<dyn SchemaRule + Send + Sync>>,
}

impl RuleRegistry {
    /// Registry preloaded with the default rule set
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_history_rule(Box::new(history::MissingMigrationFiles));
        registry.register_history_rule(Box::new(history::SquashReplacementsApplied));

        registry.register_schema_rule(Box::new(tables::ExpectedTablesExist));
        registry.register_schema_rule(Box::new(tables::NoUnexpectedTables));
        registry.register_schema_rule(Box::new(columns::ExpectedColumnsExist));
        registry.register_schema_rule(Box::new(columns::ColumnNullabilityMatches));
        registry.register_schema_rule(Box::new(columns::NoUnexpectedColumns));
        registry.register_schema_rule(Box::new(tables::NoEmptyTables));
        registry.register_schema_rule(Box::new(tables::TableNamingConvention::default()));
        registry.register_schema_rule(Box::new(tables::NoLegacyTables::default()));
        registry.register_schema_rule(Box::new(tables::TableCountBounds::default()));
        registry.register_schema_rule(Box::new(columns::PrimaryKeyPresent::default()));
        registry.register_schema_rule(Box::new(constraints::ForeignKeyColumnsExist));
        registry.register_schema_rule(Box::new(constraints::NoOrphanedForeignKeys));
        registry.register_schema_rule(Box::new(constraints::UniqueCandidateColumns::default()));

        registry
    }

    /// Registry with no rules registered
    pub fn empty() -> Self {
        Self {
            history_rules: Vec::new(),
            schema_rules: Vec::new(),
        }
    }

    /// Default rule set tuned from audit configuration
    pub fn from_config(config: &AuditConfig) -> Self {
        let mut registry = Self::empty();

        registry.register_history_rule(Box::new(history::MissingMigrationFiles));
        registry.register_history_rule(Box::new(history::SquashReplacementsApplied));

        registry.register_schema_rule(Box::new(tables::ExpectedTablesExist));
        registry.register_schema_rule(Box::new(tables::NoUnexpectedTables));
        registry.register_schema_rule(Box::new(columns::ExpectedColumnsExist));
        registry.register_schema_rule(Box::new(columns::ColumnNullabilityMatches));
        registry.register_schema_rule(Box::new(columns::NoUnexpectedColumns));
        registry.register_schema_rule(Box::new(tables::NoEmptyTables));
        registry.register_schema_rule(Box::new(tables::TableNamingConvention::new(
            config.internal_prefixes.clone(),
        )));
        registry.register_schema_rule(Box::new(tables::NoLegacyTables::new(
            config.legacy_prefixes.clone(),
        )));
        registry.register_schema_rule(Box::new(tables::TableCountBounds::new(
            config.min_tables,
            config.max_tables,
            config.internal_prefixes.clone(),
        )));
        registry.register_schema_rule(Box::new(columns::PrimaryKeyPresent::new(
            config.internal_prefixes.clone(),
        )));
        registry.register_schema_rule(Box::new(constraints::ForeignKeyColumnsExist));
        registry.register_schema_rule(Box::new(constraints::NoOrphanedForeignKeys));
        registry.register_schema_rule(Box::new(constraints::UniqueCandidateColumns::new(
            config.internal_prefixes.clone(),
        )));

        registry
    }

    pub fn register_history_rule(&mut self, rule: Box<dyn HistoryRule + Send + Sync>) {
        self.history_rules.push(rule);
    }

    pub fn register_schema_rule(&mut self, rule: Box<dyn SchemaRule + Send + Sync>) {
        self.schema_rules.push(rule);
    }

    pub fn history_rule_count(&self) -> usize {
        self.history_rules.len()
    }

    pub fn schema_rule_count(&self) -> usize {
        self.schema_rules.len()
    }

    /// Run every registered history rule and concatenate the findings
    pub fn run_history_rules(&self, history: &MigrationHistory) -> Vec<Violation> {
        self.history_rules
            .iter()
            .flat_map(|rule| rule.check(history))
            .collect()
    }

    /// Run every registered schema rule and concatenate the findings
    pub fn run_schema_rules(&self, expected: &Schema, actual: &Schema) -> Vec<Violation> {
        self.schema_rules
            .iter()
            .flat_map(|rule| rule.check(expected, actual))
            .collect()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn is_internal(table_name: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| table_name.starts_with(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Table};
    use std::collections::BTreeSet;

    #[test]
    fn test_severity_is_ranked() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_violation_display() {
        let violation = Violation::new("missing_migrations", Severity::Error, "file is missing");
        assert_eq!(
            violation.to_string(),
            "[ERROR] missing_migrations: file is missing"
        );
    }

    #[test]
    fn test_default_registry_counts() {
        let registry = RuleRegistry::new();
        assert_eq!(registry.history_rule_count(), 2);
        assert_eq!(registry.schema_rule_count(), 13);
    }

    #[test]
    fn test_custom_rule_registration() {
        struct AlwaysFires;
        impl SchemaRule for AlwaysFires {
            fn name(&self) -> &str {
                "always_fires"
            }
            fn description(&self) -> &str {
                "fires on every check"
            }
            fn check(&self, _expected: &Schema, _actual: &Schema) -> Vec<Violation> {
                vec![Violation::new("always_fires", Severity::Info, "hello")]
            }
        }

        let mut registry = RuleRegistry::empty();
        registry.register_schema_rule(Box::new(AlwaysFires));

        let violations = registry.run_schema_rules(&Schema::default(), &Schema::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "always_fires");
    }

    #[test]
    fn test_run_schema_rules_concatenates_across_rules() {
        // Expected has a table the actual side lacks, and the actual side has
        // a table the expected side lacks: two different rules fire.
        let expected = Schema::from_tables(vec![Table::with_columns(
            "shop_product",
            vec![Column::new("id", "integer", false)],
        )]);
        let actual = Schema::from_tables(vec![Table::with_columns(
            "shop_stray",
            vec![Column::new("id", "integer", false)],
        )]);

        let registry = RuleRegistry::new();
        let violations = registry.run_schema_rules(&expected, &actual);

        let rules: BTreeSet<&str> = violations.iter().map(|v| v.rule.as_str()).collect();
        assert!(rules.contains("expected_tables_exist"));
        assert!(rules.contains("no_unexpected_tables"));
    }

    #[test]
    fn test_rules_do_not_mutate_inputs() {
        let expected = Schema::from_tables(vec![Table::with_columns(
            "shop_product",
            vec![Column::new("id", "integer", false)],
        )]);
        let actual = Schema::default();
        let before = expected.clone();

        let registry = RuleRegistry::new();
        let _ = registry.run_schema_rules(&expected, &actual);
        assert_eq!(expected, before);
    }
}
