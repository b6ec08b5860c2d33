//! Table-level schema rules

use serde_json::json;

use super::{is_internal, SchemaRule, Severity, Violation};
use crate::schema::Schema;

/// Every table the migrations promise must exist in the database
pub struct ExpectedTablesExist;

impl SchemaRule for ExpectedTablesExist {
    fn name(&self) -> &str {
        "expected_tables_exist"
    }

    fn description(&self) -> &str {
        "All tables from migration operations must exist in the actual database"
    }

    fn check(&self, expected: &Schema, actual: &Schema) -> Vec<Violation> {
        expected
            .all_tables()
            .filter(|table| !actual.has_table(&table.name))
            .map(|table| {
                Violation::new(
                    self.name(),
                    Severity::Error,
                    format!("Expected table '{}' does not exist in database", table.name),
                )
                .with_details(json!({ "table_name": table.name }))
            })
            .collect()
    }
}

/// No table should exist in the database that migrations never created
pub struct NoUnexpectedTables;

impl SchemaRule for NoUnexpectedTables {
    fn name(&self) -> &str {
        "no_unexpected_tables"
    }

    fn description(&self) -> &str {
        "No tables should exist in the database that aren't defined in migrations"
    }

    fn check(&self, expected: &Schema, actual: &Schema) -> Vec<Violation> {
        actual
            .all_tables()
            .filter(|table| !expected.has_table(&table.name))
            .map(|table| {
                Violation::new(
                    self.name(),
                    Severity::Warning,
                    format!("Unexpected table '{}' exists in database", table.name),
                )
                .with_details(json!({ "table_name": table.name }))
            })
            .collect()
    }
}

/// Sanity check for corrupted or half-created tables
pub struct NoEmptyTables;

impl SchemaRule for NoEmptyTables {
    fn name(&self) -> &str {
        "no_empty_tables"
    }

    fn description(&self) -> &str {
        "All tables should have at least one column"
    }

    fn check(&self, _expected: &Schema, actual: &Schema) -> Vec<Violation> {
        actual
            .all_tables()
            .filter(|table| table.columns.is_empty())
            .map(|table| {
                Violation::new(
                    self.name(),
                    Severity::Error,
                    format!("Table '{}' has no columns", table.name),
                )
                .with_details(json!({ "table": table.name }))
            })
            .collect()
    }
}

/// Tables are expected to follow the `app_entity` naming convention
#[derive(Default)]
pub struct TableNamingConvention {
    internal_prefixes: Vec<String>,
}

impl TableNamingConvention {
    pub fn new(internal_prefixes: Vec<String>) -> Self {
        Self { internal_prefixes }
    }
}

impl SchemaRule for TableNamingConvention {
    fn name(&self) -> &str {
        "table_naming"
    }

    fn description(&self) -> &str {
        "Tables should follow the app_entity naming convention"
    }

    fn check(&self, _expected: &Schema, actual: &Schema) -> Vec<Violation> {
        actual
            .all_tables()
            .filter(|table| !is_internal(&table.name, &self.internal_prefixes))
            .filter(|table| !table.name.contains('_'))
            .map(|table| {
                Violation::new(
                    self.name(),
                    Severity::Info,
                    format!(
                        "Table '{}' doesn't follow the app_entity naming convention",
                        table.name
                    ),
                )
                .with_details(json!({
                    "table": table.name,
                    "expected_pattern": "app_entity",
                }))
            })
            .collect()
    }
}

pub(crate) const DEFAULT_LEGACY_PREFIXES: [&str; 6] =
    ["old_", "legacy_", "temp_", "tmp_", "backup_", "deprecated_"];

/// Tables with legacy prefixes should have been removed long ago
pub struct NoLegacyTables {
    prefixes: Vec<String>,
}

impl NoLegacyTables {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl Default for NoLegacyTables {
    fn default() -> Self {
        Self::new(DEFAULT_LEGACY_PREFIXES.iter().map(|p| p.to_string()).collect())
    }
}

impl SchemaRule for NoLegacyTables {
    fn name(&self) -> &str {
        "no_legacy_tables"
    }

    fn description(&self) -> &str {
        "No tables with legacy prefixes should exist"
    }

    fn check(&self, _expected: &Schema, actual: &Schema) -> Vec<Violation> {
        let mut violations = Vec::new();

        for table in actual.all_tables() {
            // One finding per table, first matching prefix wins
            if let Some(prefix) = self.prefixes.iter().find(|p| table.name.starts_with(p.as_str())) {
                violations.push(
                    Violation::new(
                        self.name(),
                        Severity::Warning,
                        format!("Legacy table '{}' still exists (prefix: {})", table.name, prefix),
                    )
                    .with_details(json!({
                        "table": table.name,
                        "prefix": prefix,
                    })),
                );
            }
        }

        violations
    }
}

/// Sanity bounds on the number of non-internal tables
pub struct TableCountBounds {
    min: usize,
    max: usize,
    internal_prefixes: Vec<String>,
}

impl TableCountBounds {
    pub fn new(min: usize, max: usize, internal_prefixes: Vec<String>) -> Self {
        Self {
            min,
            max,
            internal_prefixes,
        }
    }
}

impl Default for TableCountBounds {
    fn default() -> Self {
        Self::new(1, 500, Vec::new())
    }
}

impl SchemaRule for TableCountBounds {
    fn name(&self) -> &str {
        "table_count_bounds"
    }

    fn description(&self) -> &str {
        "Number of tables should stay within the configured bounds"
    }

    fn check(&self, _expected: &Schema, actual: &Schema) -> Vec<Violation> {
        let count = actual
            .all_tables()
            .filter(|table| !is_internal(&table.name, &self.internal_prefixes))
            .count();

        if count < self.min {
            vec![Violation::new(
                self.name(),
                Severity::Error,
                format!("Too few tables: {} (minimum: {})", count, self.min),
            )
            .with_details(json!({ "count": count, "min": self.min }))]
        } else if count > self.max {
            vec![Violation::new(
                self.name(),
                Severity::Warning,
                format!("Too many tables: {} (maximum: {})", count, self.max),
            )
            .with_details(json!({ "count": count, "max": self.max }))]
        } else {
            Vec::new()
        }
    }
}
