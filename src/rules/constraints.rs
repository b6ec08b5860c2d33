//! Constraint-flavored schema rules
//!
//! Constraint and index operations are not modeled in the canonical schema
//! yet, so these rules work from column naming patterns. They are explicitly
//! heuristic and degrade to "no finding" on anything they cannot classify.

use serde_json::json;
use std::collections::BTreeSet;

use super::{is_internal, SchemaRule, Severity, Violation};
use crate::schema::Schema;

fn looks_like_foreign_key(column_name: &str) -> bool {
    column_name.ends_with("_id") && column_name != "id"
}

/// Promised relationship columns (`*_id`) must exist in the database
pub struct ForeignKeyColumnsExist;

impl SchemaRule for ForeignKeyColumnsExist {
    fn name(&self) -> &str {
        "foreign_key_columns_exist"
    }

    fn description(&self) -> &str {
        "Foreign key columns (ending in _id) should exist for relationship fields"
    }

    fn check(&self, expected: &Schema, actual: &Schema) -> Vec<Violation> {
        let mut violations = Vec::new();

        for expected_table in expected.all_tables() {
            let Some(actual_table) = actual.table(&expected_table.name) else {
                continue;
            };

            for column_name in expected_table.columns.keys() {
                if !looks_like_foreign_key(column_name) {
                    continue;
                }
                if actual_table.has_column(column_name) {
                    continue;
                }
                violations.push(
                    Violation::new(
                        self.name(),
                        Severity::Error,
                        format!(
                            "Foreign key column '{}.{}' is missing",
                            expected_table.name, column_name
                        ),
                    )
                    .with_details(json!({
                        "table": expected_table.name,
                        "column": column_name,
                    })),
                );
            }
        }

        violations
    }
}

/// A `*_id` column should point at an entity some table plausibly backs
///
/// Heuristic: `author_id` expects a table named `author` or `*_author`.
pub struct NoOrphanedForeignKeys;

impl SchemaRule for NoOrphanedForeignKeys {
    fn name(&self) -> &str {
        "no_orphaned_foreign_keys"
    }

    fn description(&self) -> &str {
        "Foreign key columns should reference existing tables (name heuristic)"
    }

    fn check(&self, _expected: &Schema, actual: &Schema) -> Vec<Violation> {
        let mut violations = Vec::new();

        for table in actual.all_tables() {
            for column_name in table.columns.keys() {
                if !looks_like_foreign_key(column_name) {
                    continue;
                }

                let entity = &column_name[..column_name.len() - 3];
                let suffix = format!("_{}", entity);
                let found = actual
                    .all_tables()
                    .any(|candidate| candidate.name.ends_with(&suffix) || candidate.name == *entity);

                if !found {
                    violations.push(
                        Violation::new(
                            self.name(),
                            Severity::Warning,
                            format!(
                                "Column '{}.{}' appears to be a foreign key but no table for '{}' was found",
                                table.name, column_name, entity
                            ),
                        )
                        .with_details(json!({
                            "table": table.name,
                            "column": column_name,
                            "inferred_entity": entity,
                        })),
                    );
                }
            }
        }

        violations
    }
}

const DEFAULT_UNIQUE_CANDIDATES: [&str; 6] = ["email", "username", "slug", "uuid", "code", "token"];

/// Columns that usually carry a unique constraint are worth a second look
pub struct UniqueCandidateColumns {
    candidates: BTreeSet<String>,
    internal_prefixes: Vec<String>,
}

impl UniqueCandidateColumns {
    pub fn new(internal_prefixes: Vec<String>) -> Self {
        Self {
            candidates: DEFAULT_UNIQUE_CANDIDATES.iter().map(|c| c.to_string()).collect(),
            internal_prefixes,
        }
    }
}

impl Default for UniqueCandidateColumns {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SchemaRule for UniqueCandidateColumns {
    fn name(&self) -> &str {
        "unique_candidate_columns"
    }

    fn description(&self) -> &str {
        "Columns that commonly carry a unique constraint (name heuristic)"
    }

    fn check(&self, _expected: &Schema, actual: &Schema) -> Vec<Violation> {
        let mut violations = Vec::new();

        for table in actual.all_tables() {
            if is_internal(&table.name, &self.internal_prefixes) {
                continue;
            }
            for column_name in table.columns.keys() {
                if !self.candidates.contains(column_name) {
                    continue;
                }
                violations.push(
                    Violation::new(
                        self.name(),
                        Severity::Info,
                        format!(
                            "Column '{}.{}' commonly has a unique constraint. Verify this is configured correctly.",
                            table.name, column_name
                        ),
                    )
                    .with_details(json!({
                        "table": table.name,
                        "column": column_name,
                        "hint": "This column name typically requires a unique constraint",
                    })),
                );
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Table};

    #[test]
    fn test_fk_columns_exist_flags_missing() {
        let expected = Schema::from_tables(vec![Table::with_columns(
            "shop_order",
            vec![
                Column::new("id", "integer", false),
                Column::new("customer_id", "integer", false),
            ],
        )]);
        let actual = Schema::from_tables(vec![Table::with_columns(
            "shop_order",
            vec![Column::new("id", "integer", false)],
        )]);

        let violations = ForeignKeyColumnsExist.check(&expected, &actual);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Error);
        assert_eq!(
            violations[0].message,
            "Foreign key column 'shop_order.customer_id' is missing"
        );
    }

    #[test]
    fn test_fk_check_ignores_plain_id() {
        let expected = Schema::from_tables(vec![Table::with_columns(
            "shop_order",
            vec![Column::new("id", "integer", false)],
        )]);
        let actual = Schema::from_tables(vec![Table::new("shop_order")]);

        // "id" alone is a primary key, not a relationship column
        assert!(ForeignKeyColumnsExist.check(&expected, &actual).is_empty());
    }

    #[test]
    fn test_orphaned_fk_warns_when_no_entity_table() {
        let actual = Schema::from_tables(vec![Table::with_columns(
            "shop_order",
            vec![
                Column::new("id", "integer", false),
                Column::new("supplier_id", "integer", false),
            ],
        )]);

        let violations = NoOrphanedForeignKeys.check(&Schema::default(), &actual);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].message,
            "Column 'shop_order.supplier_id' appears to be a foreign key but no table for 'supplier' was found"
        );
        assert_eq!(
            violations[0].details.as_ref().unwrap()["inferred_entity"],
            "supplier"
        );
    }

    #[test]
    fn test_orphaned_fk_resolves_prefixed_entity_table() {
        let actual = Schema::from_tables(vec![
            Table::with_columns(
                "shop_order",
                vec![Column::new("customer_id", "integer", false)],
            ),
            Table::with_columns("crm_customer", vec![Column::new("id", "integer", false)]),
        ]);

        assert!(NoOrphanedForeignKeys.check(&Schema::default(), &actual).is_empty());
    }

    #[test]
    fn test_orphaned_fk_resolves_bare_entity_table() {
        let actual = Schema::from_tables(vec![
            Table::with_columns("shop_order", vec![Column::new("customer_id", "integer", false)]),
            Table::with_columns("customer", vec![Column::new("id", "integer", false)]),
        ]);

        assert!(NoOrphanedForeignKeys.check(&Schema::default(), &actual).is_empty());
    }

    #[test]
    fn test_unique_candidates_hinted() {
        let actual = Schema::from_tables(vec![Table::with_columns(
            "crm_customer",
            vec![
                Column::new("id", "integer", false),
                Column::new("email", "varchar", false),
            ],
        )]);

        let violations = UniqueCandidateColumns::default().check(&Schema::default(), &actual);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Info);
        assert_eq!(
            violations[0].message,
            "Column 'crm_customer.email' commonly has a unique constraint. Verify this is configured correctly."
        );
    }

    #[test]
    fn test_unique_candidates_skip_internal_tables() {
        let actual = Schema::from_tables(vec![Table::with_columns(
            "framework_account",
            vec![Column::new("email", "varchar", false)],
        )]);
        let rule = UniqueCandidateColumns::new(vec!["framework_".to_string()]);

        assert!(rule.check(&Schema::default(), &actual).is_empty());
    }
}
