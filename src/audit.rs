//! Audit orchestration
//!
//! Ties the orderer, the projection engine and the rule registry together
//! into a single run that produces one serializable report. The orchestrator
//! never talks to the database itself; the introspected schema arrives
//! pre-built from the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;

use crate::error::{config_error, AuditError, AuditResult};
use crate::graph::{order_applied, DependencyGraph, MigrationId};
use crate::history::MigrationHistory;
use crate::project::SchemaProjector;
use crate::rules::{RuleRegistry, Severity, Violation};
use crate::schema::{schema_fingerprint, Schema};

/// Which comparison families to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditScope {
    /// History rules only: recorded history against on-disk scripts
    History,
    /// Schema rules only: projected schema against the live database
    Schema,
    /// Both families
    All,
}

impl AuditScope {
    pub fn includes_history(self) -> bool {
        matches!(self, Self::History | Self::All)
    }

    pub fn includes_schema(self) -> bool {
        matches!(self, Self::Schema | Self::All)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Schema => "schema",
            Self::All => "all",
        }
    }
}

impl std::fmt::Display for AuditScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditScope {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "history" => Ok(Self::History),
            "schema" => Ok(Self::Schema),
            "all" => Ok(Self::All),
            other => Err(config_error(format!(
                "Unknown audit scope '{}' (expected history, schema or all)",
                other
            ))),
        }
    }
}

/// Violation counts broken down by severity
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl AuditSummary {
    fn tally(violations: &[Violation]) -> Self {
        let mut summary = Self {
            total: violations.len(),
            ..Self::default()
        };
        for violation in violations {
            match violation.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
        }
        summary
    }
}

/// Complete result of one audit run
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub scope: AuditScope,
    pub applied: usize,
    pub on_disk: usize,
    /// Applied migrations with no script on disk
    pub missing: Vec<MigrationId>,
    pub squash_replacements: usize,
    /// Migrations still pending, in apply order
    pub pending: Vec<MigrationId>,
    pub expected_tables: usize,
    pub actual_tables: usize,
    pub expected_fingerprint: Option<String>,
    pub actual_fingerprint: Option<String>,
    pub violations: Vec<Violation>,
    pub summary: AuditSummary,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Runs the configured rule families over one consistent view of the world
pub struct Auditor {
    projector: SchemaProjector,
    registry: RuleRegistry,
}

impl Auditor {
    pub fn new(projector: SchemaProjector, registry: RuleRegistry) -> Self {
        Self {
            projector,
            registry,
        }
    }

    /// History-side checks: is the recorded history trustworthy?
    pub fn audit_history(&self, history: &MigrationHistory) -> Vec<Violation> {
        self.registry.run_history_rules(history)
    }

    /// Replay the applied portion of the graph into an expected schema
    pub fn project_expected(
        &self,
        graph: &DependencyGraph,
        applied: &BTreeSet<MigrationId>,
    ) -> AuditResult<Schema> {
        let ordered = order_applied(graph, applied)?;
        Ok(self.projector.project(graph, &ordered))
    }

    /// Schema-side checks: does the database match what migrations promise?
    pub fn audit_schema(&self, expected: &Schema, actual: &Schema) -> Vec<Violation> {
        self.registry.run_schema_rules(expected, actual)
    }

    /// Full audit run producing a report
    ///
    /// `actual` is required only when the scope includes schema rules.
    pub fn run(
        &self,
        scope: AuditScope,
        graph: &DependencyGraph,
        history: &MigrationHistory,
        actual: Option<&Schema>,
    ) -> AuditResult<AuditReport> {
        let mut violations = Vec::new();

        if scope.includes_history() {
            info!(
                "Running history rules ({} applied, {} on disk)",
                history.applied().len(),
                history.on_disk().len()
            );
            violations.extend(self.audit_history(history));
        }

        let mut expected_tables = 0;
        let mut actual_tables = 0;
        let mut expected_fingerprint = None;
        let mut actual_fingerprint = None;

        if scope.includes_schema() {
            let actual = actual.ok_or_else(|| {
                config_error("Schema audit requested but no introspected schema was provided")
            })?;
            let expected = self.project_expected(graph, history.applied())?;

            expected_tables = expected.table_count();
            actual_tables = actual.table_count();
            expected_fingerprint = Some(schema_fingerprint(&expected));
            actual_fingerprint = Some(schema_fingerprint(actual));

            info!(
                "Running schema rules ({} expected tables, {} actual tables)",
                expected_tables, actual_tables
            );
            violations.extend(self.audit_schema(&expected, actual));
        }

        let summary = AuditSummary::tally(&violations);

        Ok(AuditReport {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            scope,
            applied: history.applied().len(),
            on_disk: history.on_disk().len(),
            missing: history.missing().into_iter().collect(),
            squash_replacements: history.squash_replacements().len(),
            pending: history.forward_plan().to_vec(),
            expected_tables,
            actual_tables,
            expected_fingerprint,
            actual_fingerprint,
            violations,
            summary,
        })
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new(SchemaProjector::default(), RuleRegistry::new())
    }
}
