//! Canonical schema value types
//!
//! Immutable representations of columns, tables and whole schemas. Both the
//! projection engine and the live introspector produce these exact types, so
//! the rule engine never needs an adapter between the two sides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical representation of a database column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Normalized type tag (see [`crate::schema::TypeMap`])
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
        }
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Identity tuple for comparison across sources.
    ///
    /// Two columns are considered the same object when name and normalized
    /// type agree; nullability and defaults are compared separately by the
    /// rules that care about them.
    pub fn identity(&self) -> (&str, &str) {
        (&self.name, &self.data_type)
    }
}

/// Canonical representation of a database table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Columns keyed by name; BTreeMap keeps iteration deterministic
    pub columns: BTreeMap<String, Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
        }
    }

    pub fn with_columns(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    pub fn has_column(&self, column_name: &str) -> bool {
        self.columns.contains_key(column_name)
    }

    pub fn column(&self, column_name: &str) -> Option<&Column> {
        self.columns.get(column_name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// Canonical representation of an entire database schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: BTreeMap<String, Table>,
}

impl Schema {
    pub fn new(tables: BTreeMap<String, Table>) -> Self {
        Self { tables }
    }

    pub fn from_tables(tables: Vec<Table>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn has_table(&self, table_name: &str) -> bool {
        self.tables.contains_key(table_name)
    }

    pub fn table(&self, table_name: &str) -> Option<&Table> {
        self.tables.get(table_name)
    }

    pub fn all_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_identity_ignores_nullability() {
        let a = Column::new("email", "varchar", true);
        let b = Column::new("email", "varchar", false);
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a, b);
    }

    #[test]
    fn test_column_identity_differs_on_type() {
        let a = Column::new("id", "integer", false);
        let b = Column::new("id", "bigint", false);
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_table_column_lookup() {
        let table = Table::with_columns(
            "shop_product",
            vec![
                Column::new("id", "integer", false),
                Column::new("name", "varchar", false),
            ],
        );

        assert!(table.has_column("id"));
        assert!(!table.has_column("price"));
        assert_eq!(table.column("name").map(|c| c.data_type.as_str()), Some("varchar"));
        assert!(table.column("price").is_none());
    }

    #[test]
    fn test_schema_table_lookup() {
        let schema = Schema::from_tables(vec![Table::new("shop_product")]);

        assert!(schema.has_table("shop_product"));
        assert!(!schema.has_table("shop_order"));
        assert!(schema.table("shop_product").is_some());
        assert!(schema.table("shop_order").is_none());
        assert_eq!(schema.table_count(), 1);
    }

    #[test]
    fn test_schema_equality_is_structural() {
        let build = || {
            Schema::from_tables(vec![Table::with_columns(
                "shop_product",
                vec![Column::new("id", "integer", false).with_default("nextval")],
            )])
        };
        assert_eq!(build(), build());
    }
}
