//! Type normalization
//!
//! Maps semantic field kinds from migration scripts and raw SQL type
//! spellings from the live database onto one shared type vocabulary. The map
//! is a plain value handed to the projection engine and the introspector, so
//! alternative dialects can be injected without touching either engine.

use std::collections::BTreeMap;

/// Tag used for field kinds the map does not recognize
pub const UNKNOWN_TYPE: &str = "unknown";

/// Normalized type vocabulary shared by both comparison sides
#[derive(Debug, Clone)]
pub struct TypeMap {
    kinds: BTreeMap<String, String>,
}

impl TypeMap {
    /// The standard PostgreSQL-flavored mapping
    pub fn standard() -> Self {
        let mut kinds = BTreeMap::new();
        for (kind, tag) in [
            ("auto", "integer"),
            ("big_auto", "bigint"),
            ("integer", "integer"),
            ("big_integer", "bigint"),
            ("char", "varchar"),
            ("text", "text"),
            ("boolean", "boolean"),
            ("date", "date"),
            ("datetime", "timestamp"),
            ("decimal", "numeric"),
            ("float", "double precision"),
            ("email", "varchar"),
            ("url", "varchar"),
            ("foreign_key", "integer"),
            ("one_to_one", "integer"),
        ] {
            kinds.insert(kind.to_string(), tag.to_string());
        }
        Self { kinds }
    }

    /// A map with no registered kinds; every lookup yields [`UNKNOWN_TYPE`]
    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Register or override a field kind mapping
    pub fn with_kind(mut self, kind: impl Into<String>, tag: impl Into<String>) -> Self {
        self.kinds.insert(kind.into(), tag.into());
        self
    }

    /// Resolve a semantic field kind to its normalized tag
    pub fn field_type(&self, kind: &str) -> String {
        self.kinds
            .get(kind)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_TYPE.to_string())
    }

    /// Fold a raw database type spelling onto the normalized vocabulary
    ///
    /// PostgreSQL reports several spellings for types the vocabulary knows
    /// under one tag. Anything unrecognized passes through lowercased.
    pub fn normalize_db_type(&self, raw: &str) -> String {
        let lower = raw.to_lowercase();
        match lower.as_str() {
            "character varying" => "varchar".to_string(),
            "timestamp with time zone" | "timestamp without time zone" | "timestamptz" => {
                "timestamp".to_string()
            }
            _ => lower,
        }
    }
}

impl Default for TypeMap {
    fn default() -> Self {
        Self::standard()
    }
}
