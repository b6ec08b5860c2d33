//! Column-level schema rules

use serde_json::json;
use std::collections::BTreeSet;

use super::{is_internal, SchemaRule, Severity, Violation};
use crate::schema::Schema;

/// Every column the migrations promise must exist with the promised type
///
/// Tables absent from the actual schema are skipped here; the table-level
/// rule already reports those, and double reporting would drown the signal.
pub struct ExpectedColumnsExist;

impl SchemaRule for ExpectedColumnsExist {
    fn name(&self) -> &str {
        "expected_columns_exist"
    }

    fn description(&self) -> &str {
        "All columns from migration operations must exist with correct types"
    }

    fn check(&self, expected: &Schema, actual: &Schema) -> Vec<Violation> {
        let mut violations = Vec::new();

        for expected_table in expected.all_tables() {
            let Some(actual_table) = actual.table(&expected_table.name) else {
                continue;
            };

            for (column_name, expected_column) in &expected_table.columns {
                match actual_table.column(column_name) {
                    None => violations.push(
                        Violation::new(
                            self.name(),
                            Severity::Error,
                            format!(
                                "Expected column '{}.{}' does not exist",
                                expected_table.name, column_name
                            ),
                        )
                        .with_details(json!({
                            "table_name": expected_table.name,
                            "column_name": column_name,
                            "expected_type": expected_column.data_type,
                        })),
                    ),
                    Some(actual_column) if actual_column.data_type != expected_column.data_type => {
                        violations.push(
                            Violation::new(
                                self.name(),
                                Severity::Error,
                                format!(
                                    "Column '{}.{}' has wrong type",
                                    expected_table.name, column_name
                                ),
                            )
                            .with_details(json!({
                                "table_name": expected_table.name,
                                "column_name": column_name,
                                "expected_type": expected_column.data_type,
                                "actual_type": actual_column.data_type,
                            })),
                        )
                    }
                    Some(_) => {}
                }
            }
        }

        violations
    }
}

/// Columns present in the database but never defined by a migration
pub struct NoUnexpectedColumns;

impl SchemaRule for NoUnexpectedColumns {
    fn name(&self) -> &str {
        "no_unexpected_columns"
    }

    fn description(&self) -> &str {
        "No columns should exist in the database that aren't in migrations"
    }

    fn check(&self, expected: &Schema, actual: &Schema) -> Vec<Violation> {
        let mut violations = Vec::new();

        for expected_table in expected.all_tables() {
            let Some(actual_table) = actual.table(&expected_table.name) else {
                continue;
            };

            for (column_name, column) in &actual_table.columns {
                if expected_table.has_column(column_name) {
                    continue;
                }
                violations.push(
                    Violation::new(
                        self.name(),
                        Severity::Warning,
                        format!(
                            "Unexpected column '{}.{}' (type: {}) exists in database but not in migrations",
                            expected_table.name, column_name, column.data_type
                        ),
                    )
                    .with_details(json!({
                        "table": expected_table.name,
                        "column": column_name,
                        "data_type": column.data_type,
                        "nullable": column.nullable,
                    })),
                );
            }
        }

        violations
    }
}

/// NULL/NOT NULL must agree between migrations and database
pub struct ColumnNullabilityMatches;

impl SchemaRule for ColumnNullabilityMatches {
    fn name(&self) -> &str {
        "column_nullability"
    }

    fn description(&self) -> &str {
        "Column nullability should match between migrations and database"
    }

    fn check(&self, expected: &Schema, actual: &Schema) -> Vec<Violation> {
        let mut violations = Vec::new();

        for expected_table in expected.all_tables() {
            let Some(actual_table) = actual.table(&expected_table.name) else {
                continue;
            };

            for (column_name, expected_column) in &expected_table.columns {
                let Some(actual_column) = actual_table.column(column_name) else {
                    continue;
                };
                if expected_column.nullable == actual_column.nullable {
                    continue;
                }

                let describe = |nullable: bool| if nullable { "NULL" } else { "NOT NULL" };
                violations.push(
                    Violation::new(
                        self.name(),
                        Severity::Warning,
                        format!(
                            "Column '{}.{}' nullability mismatch: expected {}, actual {}",
                            expected_table.name,
                            column_name,
                            describe(expected_column.nullable),
                            describe(actual_column.nullable)
                        ),
                    )
                    .with_details(json!({
                        "table": expected_table.name,
                        "column": column_name,
                        "expected_nullable": expected_column.nullable,
                        "actual_nullable": actual_column.nullable,
                    })),
                );
            }
        }

        violations
    }
}

const DEFAULT_KEY_COLUMNS: [&str; 3] = ["id", "pk", "uuid"];

/// Best-effort check that every table carries a recognizable key column
///
/// Purely name-based: a table keyed on anything outside the configured names
/// is reported even if it has a perfectly good primary key.
pub struct PrimaryKeyPresent {
    key_columns: BTreeSet<String>,
    internal_prefixes: Vec<String>,
}

impl PrimaryKeyPresent {
    pub fn new(internal_prefixes: Vec<String>) -> Self {
        Self {
            key_columns: DEFAULT_KEY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            internal_prefixes,
        }
    }

    pub fn with_key_columns(mut self, key_columns: BTreeSet<String>) -> Self {
        self.key_columns = key_columns;
        self
    }
}

impl Default for PrimaryKeyPresent {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SchemaRule for PrimaryKeyPresent {
    fn name(&self) -> &str {
        "primary_key_present"
    }

    fn description(&self) -> &str {
        "All tables should have a recognizable primary key column (name heuristic)"
    }

    fn check(&self, _expected: &Schema, actual: &Schema) -> Vec<Violation> {
        actual
            .all_tables()
            .filter(|table| !is_internal(&table.name, &self.internal_prefixes))
            .filter(|table| {
                !table
                    .column_names()
                    .any(|name| self.key_columns.contains(name))
            })
            .map(|table| {
                Violation::new(
                    self.name(),
                    Severity::Warning,
                    format!(
                        "Table '{}' appears to be missing a primary key column",
                        table.name
                    ),
                )
                .with_details(json!({
                    "table": table.name,
                    "columns": table.column_names().collect::<Vec<_>>(),
                }))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Table};

    fn product_expected() -> Schema {
        Schema::from_tables(vec![Table::with_columns(
            "shop_product",
            vec![
                Column::new("id", "integer", false),
                Column::new("name", "varchar", false),
            ],
        )])
    }

    #[test]
    fn test_expected_columns_pass_when_identical() {
        let expected = product_expected();
        let actual = product_expected();
        assert!(ExpectedColumnsExist.check(&expected, &actual).is_empty());
    }

    #[test]
    fn test_expected_columns_flag_missing_column() {
        let expected = product_expected();
        let actual = Schema::from_tables(vec![Table::with_columns(
            "shop_product",
            vec![Column::new("id", "integer", false)],
        )]);

        let violations = ExpectedColumnsExist.check(&expected, &actual);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Error);
        assert_eq!(
            violations[0].message,
            "Expected column 'shop_product.name' does not exist"
        );
        assert_eq!(
            violations[0].details.as_ref().unwrap()["expected_type"],
            "varchar"
        );
    }

    #[test]
    fn test_expected_columns_flag_type_mismatch() {
        let expected = product_expected();
        let actual = Schema::from_tables(vec![Table::with_columns(
            "shop_product",
            vec![
                Column::new("id", "bigint", false),
                Column::new("name", "varchar", false),
            ],
        )]);

        let violations = ExpectedColumnsExist.check(&expected, &actual);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message, "Column 'shop_product.id' has wrong type");
        let details = violations[0].details.as_ref().unwrap();
        assert_eq!(details["expected_type"], "integer");
        assert_eq!(details["actual_type"], "bigint");
    }

    #[test]
    fn test_expected_columns_skip_tables_missing_from_actual() {
        // The table-level rule owns this case; no duplicate report here.
        let expected = product_expected();
        let actual = Schema::default();
        assert!(ExpectedColumnsExist.check(&expected, &actual).is_empty());
    }

    #[test]
    fn test_unexpected_columns_flagged_with_metadata() {
        let expected = product_expected();
        let actual = Schema::from_tables(vec![Table::with_columns(
            "shop_product",
            vec![
                Column::new("id", "integer", false),
                Column::new("name", "varchar", false),
                Column::new("manual_note", "text", true),
            ],
        )]);

        let violations = NoUnexpectedColumns.check(&expected, &actual);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Warning);
        assert_eq!(
            violations[0].message,
            "Unexpected column 'shop_product.manual_note' (type: text) exists in database but not in migrations"
        );
        let details = violations[0].details.as_ref().unwrap();
        assert_eq!(details["data_type"], "text");
        assert_eq!(details["nullable"], true);
    }

    #[test]
    fn test_nullability_mismatch_warns() {
        let expected = product_expected();
        let actual = Schema::from_tables(vec![Table::with_columns(
            "shop_product",
            vec![
                Column::new("id", "integer", false),
                Column::new("name", "varchar", true),
            ],
        )]);

        let violations = ColumnNullabilityMatches.check(&expected, &actual);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].message,
            "Column 'shop_product.name' nullability mismatch: expected NOT NULL, actual NULL"
        );
    }

    #[test]
    fn test_nullability_skips_columns_missing_from_actual() {
        let expected = product_expected();
        let actual = Schema::from_tables(vec![Table::with_columns(
            "shop_product",
            vec![Column::new("id", "integer", false)],
        )]);

        assert!(ColumnNullabilityMatches.check(&expected, &actual).is_empty());
    }

    #[test]
    fn test_primary_key_present_passes_with_id() {
        let actual = product_expected();
        assert!(PrimaryKeyPresent::default().check(&Schema::default(), &actual).is_empty());
    }

    #[test]
    fn test_primary_key_missing_warns() {
        let actual = Schema::from_tables(vec![Table::with_columns(
            "shop_lookup",
            vec![Column::new("code", "varchar", false)],
        )]);

        let violations = PrimaryKeyPresent::default().check(&Schema::default(), &actual);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Warning);
        assert_eq!(
            violations[0].message,
            "Table 'shop_lookup' appears to be missing a primary key column"
        );
    }

    #[test]
    fn test_primary_key_accepts_uuid_and_skips_internal() {
        let actual = Schema::from_tables(vec![
            Table::with_columns("shop_session", vec![Column::new("uuid", "varchar", false)]),
            Table::with_columns("framework_meta", vec![Column::new("key", "varchar", false)]),
        ]);
        let rule = PrimaryKeyPresent::new(vec!["framework_".to_string()]);

        assert!(rule.check(&Schema::default(), &actual).is_empty());
    }
}
