//! migraudit - Migration Consistency Auditor
//!
//! Audits consistency of a relational schema across three independent sources
//! of truth: the recorded history of applied migrations, the migration
//! scripts on disk, and the live schema in the database.
//!
//! Two comparison families run against one consistent view of the world:
//! - History rules: can the recorded history be trusted at all?
//!   (missing script files, squashes that never took effect)
//! - Schema rules: does the database match what the migrations promise?
//!   (replayed expected schema diffed against the introspected actual one)
//!
//! The core pipeline is pure and synchronous: graph + applied set →
//! [`graph::order_applied`] → [`project::SchemaProjector`] → expected
//! [`schema::Schema`] → [`rules::RuleRegistry`] against the actual schema.
//! All I/O lives at the edges ([`loader`], [`introspect`]).

pub mod audit;
pub mod config;
pub mod error;
pub mod graph;
pub mod history;
pub mod introspect;
pub mod loader;
pub mod project;
pub mod rules;
pub mod schema;

pub use audit::{AuditReport, AuditScope, AuditSummary, Auditor};
pub use error::{AuditError, AuditResult};
pub use graph::{order_applied, ordered_nodes, DependencyGraph, MigrationId, MigrationScript};
pub use history::MigrationHistory;
pub use project::{FieldDef, Operation, SchemaProjector};
pub use rules::{HistoryRule, RuleRegistry, SchemaRule, Severity, Violation};
pub use schema::{schema_fingerprint, Column, Schema, Table, TypeMap};
