//! Schema fingerprinting
//!
//! A stable SHA-256 digest over the canonical schema content. Reports carry
//! the fingerprint of both comparison sides so two audit runs can be compared
//! without diffing full table listings.

use sha2::{Digest, Sha256};

use super::model::Schema;

/// Compute a stable fingerprint for a schema
///
/// BTreeMap iteration is already sorted, so identical schema content always
/// hashes identically regardless of construction order.
pub fn schema_fingerprint(schema: &Schema) -> String {
    let mut hasher = Sha256::new();

    // NUL-delimited records; without the delimiter, adjacent names could
    // shift their boundary and still hash identically.
    for (table_name, table) in &schema.tables {
        hasher.update(table_name.as_bytes());
        hasher.update([0u8]);
        for (column_name, column) in &table.columns {
            hasher.update(
                format!(
                    "{}.{}:{}:{}:{}",
                    table_name,
                    column_name,
                    column.data_type,
                    column.nullable,
                    column.default_value.as_deref().unwrap_or("")
                )
                .as_bytes(),
            );
            hasher.update([0u8]);
        }
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::{Column, Table};

    fn sample_schema() -> Schema {
        Schema::from_tables(vec![
            Table::with_columns(
                "shop_product",
                vec![
                    Column::new("id", "integer", false),
                    Column::new("name", "varchar", false),
                ],
            ),
            Table::with_columns("shop_order", vec![Column::new("id", "integer", false)]),
        ])
    }

    #[test]
    fn test_fingerprint_consistency() {
        let a = schema_fingerprint(&sample_schema());
        let b = schema_fingerprint(&sample_schema());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_detects_type_change() {
        let base = sample_schema();
        let mut drifted = sample_schema();
        drifted
            .tables
            .get_mut("shop_product")
            .unwrap()
            .columns
            .insert("id".to_string(), Column::new("id", "bigint", false));

        assert_ne!(schema_fingerprint(&base), schema_fingerprint(&drifted));
    }

    #[test]
    fn test_fingerprint_ignores_construction_order() {
        let forward = sample_schema();
        let reversed = Schema::from_tables(vec![
            Table::with_columns("shop_order", vec![Column::new("id", "integer", false)]),
            Table::with_columns(
                "shop_product",
                vec![
                    Column::new("name", "varchar", false),
                    Column::new("id", "integer", false),
                ],
            ),
        ]);

        assert_eq!(schema_fingerprint(&forward), schema_fingerprint(&reversed));
    }

    #[test]
    fn test_fingerprint_separates_adjacent_table_names() {
        // Two zero-column tables whose names concatenate to the same bytes
        // must not collide.
        let split_early = Schema::from_tables(vec![Table::new("a"), Table::new("bc")]);
        let split_late = Schema::from_tables(vec![Table::new("ab"), Table::new("c")]);

        assert_ne!(
            schema_fingerprint(&split_early),
            schema_fingerprint(&split_late)
        );
    }

    #[test]
    fn test_empty_schema_fingerprint_is_stable() {
        let empty = Schema::default();
        assert_eq!(schema_fingerprint(&empty), schema_fingerprint(&Schema::default()));
    }
}
