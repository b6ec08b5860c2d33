//! Schema Projection Engine
//!
//! Replays ordered migration operations against a transient mutable builder
//! to compute the expected schema, without touching the database. The
//! projected schema is the expected side of the reality check against the
//! live introspected schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::graph::{DependencyGraph, MigrationId};
use crate::schema::{Column, Schema, Table, TypeMap};

/// A field definition carried by create/add/alter operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// Semantic field kind, resolved through the [`TypeMap`]
    pub kind: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            nullable: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// One schema-affecting migration operation
///
/// Closed set: the projector matches exhaustively, so adding a variant forces
/// every replay site to decide how to handle it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Operation {
    /// Create a table for an entity
    CreateTable(CreateTableOp),
    /// Drop an entity's table
    DropTable(DropTableOp),
    /// Move an entity's table to an explicit new name
    RenameTable(RenameTableOp),
    /// Add a column
    AddColumn(AddColumnOp),
    /// Remove a column
    RemoveColumn(RemoveColumnOp),
    /// Redefine an existing column
    AlterColumn(AlterColumnOp),
    /// Add a constraint (accepted, not modeled)
    AddConstraint(AddConstraintOp),
    /// Remove a constraint (accepted, not modeled)
    RemoveConstraint(RemoveConstraintOp),
    /// Add an index (accepted, not modeled)
    AddIndex(AddIndexOp),
    /// Remove an index (accepted, not modeled)
    RemoveIndex(RemoveIndexOp),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableOp {
    pub entity: String,
    /// Explicit table name override; defaults to `{app}_{entity}` naming
    #[serde(default)]
    pub db_table: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropTableOp {
    pub entity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameTableOp {
    pub entity: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddColumnOp {
    pub entity: String,
    pub field: FieldDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveColumnOp {
    pub entity: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlterColumnOp {
    pub entity: String,
    pub field: FieldDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddConstraintOp {
    pub entity: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveConstraintOp {
    pub entity: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddIndexOp {
    pub entity: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveIndexOp {
    pub entity: String,
    pub name: String,
}

/// Mutable builder the replay mutates; one per projection pass
#[derive(Debug, Default)]
struct ProjectionState {
    tables: BTreeMap<String, BTreeMap<String, Column>>,
}

impl ProjectionState {
    fn new() -> Self {
        Self::default()
    }

    fn canonical_name(app: &str, entity: &str) -> String {
        format!("{}_{}", app, entity.to_lowercase())
    }

    /// Resolve an entity to a registered table name
    ///
    /// Tries the canonical `{app}_{entity}` name first, then falls back to a
    /// suffix scan in deterministic table order. First match wins, so two
    /// tables sharing the `_{entity}` suffix resolve to the lexicographically
    /// smaller one.
    fn resolve_table(&self, app: &str, entity: &str) -> Option<String> {
        let canonical = Self::canonical_name(app, entity);
        if self.tables.contains_key(&canonical) {
            return Some(canonical);
        }
        let suffix = format!("_{}", entity.to_lowercase());
        self.tables
            .keys()
            .find(|name| name.ends_with(&suffix))
            .cloned()
    }

    fn create_table(
        &mut self,
        app: &str,
        entity: &str,
        db_table: Option<&str>,
        fields: &[FieldDef],
        types: &TypeMap,
    ) {
        let table_name = match db_table {
            Some(name) => name.to_string(),
            None => Self::canonical_name(app, entity),
        };
        let columns = fields
            .iter()
            .map(|f| (f.name.clone(), column_from_field(f, types)))
            .collect();
        self.tables.insert(table_name, columns);
    }

    fn drop_table(&mut self, app: &str, entity: &str) {
        match self.resolve_table(app, entity) {
            Some(table_name) => {
                self.tables.remove(&table_name);
            }
            None => debug!("drop_table: no table for {}.{}, skipping", app, entity),
        }
    }

    fn rename_table(&mut self, app: &str, entity: &str, new_name: &str) {
        match self.resolve_table(app, entity) {
            Some(table_name) => {
                if let Some(columns) = self.tables.remove(&table_name) {
                    self.tables.insert(new_name.to_string(), columns);
                }
            }
            None => debug!("rename_table: no table for {}.{}, skipping", app, entity),
        }
    }

    fn add_column(&mut self, app: &str, entity: &str, field: &FieldDef, types: &TypeMap) {
        match self.resolve_table(app, entity) {
            Some(table_name) => {
                if let Some(columns) = self.tables.get_mut(&table_name) {
                    columns.insert(field.name.clone(), column_from_field(field, types));
                }
            }
            None => debug!("add_column: no table for {}.{}, skipping", app, entity),
        }
    }

    fn remove_column(&mut self, app: &str, entity: &str, name: &str) {
        match self.resolve_table(app, entity) {
            Some(table_name) => {
                if let Some(columns) = self.tables.get_mut(&table_name) {
                    columns.remove(name);
                }
            }
            None => debug!("remove_column: no table for {}.{}, skipping", app, entity),
        }
    }

    // Redefines the named column unconditionally, same as add_column; an
    // alter that precedes its add still lands the final definition.
    fn alter_column(&mut self, app: &str, entity: &str, field: &FieldDef, types: &TypeMap) {
        self.add_column(app, entity, field, types);
    }

    fn into_schema(self) -> Schema {
        let tables = self
            .tables
            .into_iter()
            .map(|(name, columns)| {
                let table = Table {
                    name: name.clone(),
                    columns,
                };
                (name, table)
            })
            .collect();
        Schema::new(tables)
    }
}

fn column_from_field(field: &FieldDef, types: &TypeMap) -> Column {
    Column {
        name: field.name.clone(),
        data_type: types.field_type(&field.kind),
        nullable: field.nullable,
        default_value: field.default.clone(),
    }
}

/// Replays ordered migration operations into an expected [`Schema`]
///
/// Unresolvable targets are skipped without failing the replay: a migration
/// set whose operations do not line up is exactly what the audit exists to
/// report, so projection must always complete.
#[derive(Debug, Clone)]
pub struct SchemaProjector {
    types: TypeMap,
}

impl SchemaProjector {
    pub fn new(types: TypeMap) -> Self {
        Self { types }
    }

    /// Replay `ordered` migrations from the graph and build the schema
    pub fn project(&self, graph: &DependencyGraph, ordered: &[MigrationId]) -> Schema {
        let mut state = ProjectionState::new();

        for id in ordered {
            let Some(script) = graph.migration(id) else {
                debug!("project: migration {} not in graph, skipping", id);
                continue;
            };
            for operation in &script.operations {
                self.apply(&script.id.app, operation, &mut state);
            }
        }

        state.into_schema()
    }

    fn apply(&self, app: &str, operation: &Operation, state: &mut ProjectionState) {
        match operation {
            Operation::CreateTable(op) => {
                state.create_table(app, &op.entity, op.db_table.as_deref(), &op.fields, &self.types);
            }
            Operation::DropTable(op) => {
                state.drop_table(app, &op.entity);
            }
            Operation::RenameTable(op) => {
                state.rename_table(app, &op.entity, &op.new_name);
            }
            Operation::AddColumn(op) => {
                state.add_column(app, &op.entity, &op.field, &self.types);
            }
            Operation::RemoveColumn(op) => {
                state.remove_column(app, &op.entity, &op.name);
            }
            Operation::AlterColumn(op) => {
                state.alter_column(app, &op.entity, &op.field, &self.types);
            }
            // Constraint and index operations are accepted but carry no
            // modeled schema effect yet.
            Operation::AddConstraint(_)
            | Operation::RemoveConstraint(_)
            | Operation::AddIndex(_)
            | Operation::RemoveIndex(_) => {}
        }
    }
}

impl Default for SchemaProjector {
    fn default() -> Self {
        Self::new(TypeMap::standard())
    }
}
