//! Migration script loading
//!
//! Reads migration scripts from disk (JSON documents, one subdirectory per
//! app), assembles them into a validated dependency graph, and pulls the
//! applied set out of the recorder table to build the history view.

use deadpool_postgres::Pool;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{config_error, script_error, AuditResult};
use crate::graph::{ordered_nodes, DependencyGraph, MigrationId, MigrationScript};
use crate::history::MigrationHistory;
use crate::project::Operation;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_$]*$").unwrap());

/// On-disk shape of one migration script document
#[derive(Debug, Deserialize)]
struct ScriptDoc {
    app: String,
    name: String,
    #[serde(default)]
    dependencies: Vec<(String, String)>,
    #[serde(default)]
    replaces: Vec<(String, String)>,
    #[serde(default)]
    operations: Vec<Operation>,
}

/// Parse one migration script document
pub fn parse_script(path: &Path, text: &str) -> AuditResult<MigrationScript> {
    let doc: ScriptDoc = serde_json::from_str(text)
        .map_err(|e| script_error(path.display().to_string(), e.to_string()))?;

    if doc.app.is_empty() || doc.name.is_empty() {
        return Err(script_error(
            path.display().to_string(),
            "app and name must be non-empty",
        ));
    }

    let id = MigrationId::new(doc.app, doc.name);
    let dependencies = doc
        .dependencies
        .into_iter()
        .map(|(app, name)| MigrationId::new(app, name))
        .collect();
    let replaces = doc
        .replaces
        .into_iter()
        .map(|(app, name)| MigrationId::new(app, name))
        .collect();

    Ok(MigrationScript::new(id, dependencies, doc.operations).with_replaces(replaces))
}

/// Load every migration script under `dir`
///
/// Layout is one subdirectory per app holding one JSON document per
/// migration; top-level JSON files are accepted too. Paths are sorted before
/// parsing so load order is stable across platforms.
pub fn load_scripts(dir: &Path) -> AuditResult<Vec<MigrationScript>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    collect_json_files(dir, &mut paths, true)?;
    paths.sort();

    let mut scripts = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path)?;
        scripts.push(parse_script(&path, &text)?);
    }
    info!(
        "Loaded {} migration scripts from {}",
        scripts.len(),
        dir.display()
    );
    Ok(scripts)
}

fn collect_json_files(dir: &Path, paths: &mut Vec<PathBuf>, recurse: bool) -> AuditResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if recurse {
                collect_json_files(&path, paths, false)?;
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    Ok(())
}

/// Assemble parsed scripts into a validated dependency graph
pub fn build_graph(scripts: Vec<MigrationScript>) -> AuditResult<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    for script in scripts {
        graph.add_migration(script);
    }
    graph.validate()?;
    Ok(graph)
}

/// Identifiers cannot be bound as query parameters, so anything interpolated
/// into SQL text must pass this check first
fn validate_identifier(name: &str) -> AuditResult<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(config_error(format!("Invalid recorder table name: {}", name)))
    }
}

/// Applied migrations from the recorder table
pub async fn load_applied(pool: &Pool, recorder_table: &str) -> AuditResult<BTreeSet<MigrationId>> {
    validate_identifier(recorder_table)?;

    let client = pool.get().await?;
    let query = format!("SELECT app, name FROM {} ORDER BY app, name", recorder_table);
    let rows = client.query(query.as_str(), &[]).await?;

    let applied = rows
        .iter()
        .map(|row| MigrationId::new(row.get::<_, String>("app"), row.get::<_, String>("name")))
        .collect();
    Ok(applied)
}

/// Assemble the complete history view for one graph and one database
pub async fn load_history(
    pool: &Pool,
    graph: &DependencyGraph,
    recorder_table: &str,
) -> AuditResult<MigrationHistory> {
    let applied = load_applied(pool, recorder_table).await?;
    let on_disk: BTreeSet<MigrationId> = graph.node_ids().cloned().collect();

    let mut squash_replacements = BTreeSet::new();
    for id in graph.node_ids() {
        if let Some(script) = graph.migration(id) {
            squash_replacements.extend(script.replaces.iter().cloned());
        }
    }

    let forward_plan: Vec<MigrationId> = ordered_nodes(graph)?
        .into_iter()
        .filter(|id| !applied.contains(id))
        .collect();

    debug!(
        "History: {} applied, {} on disk, {} pending",
        applied.len(),
        on_disk.len(),
        forward_plan.len()
    );

    Ok(MigrationHistory::new(
        applied,
        on_disk,
        squash_replacements,
        forward_plan,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> AuditResult<MigrationScript> {
        parse_script(Path::new("test.json"), text)
    }

    #[test]
    fn test_parse_minimal_script() {
        let script = parse(r#"{"app": "shop", "name": "0001_initial"}"#).unwrap();

        assert_eq!(script.id, MigrationId::new("shop", "0001_initial"));
        assert!(script.dependencies.is_empty());
        assert!(script.replaces.is_empty());
        assert!(script.operations.is_empty());
    }

    #[test]
    fn test_parse_full_script() {
        let script = parse(
            r#"{
                "app": "shop",
                "name": "0002_add_price",
                "dependencies": [["shop", "0001_initial"]],
                "replaces": [["shop", "0001_squashed"]],
                "operations": [
                    {
                        "type": "add_column",
                        "entity": "Product",
                        "field": {"name": "price", "kind": "decimal", "nullable": true}
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.dependencies, vec![MigrationId::new("shop", "0001_initial")]);
        assert_eq!(script.replaces, vec![MigrationId::new("shop", "0001_squashed")]);
        assert_eq!(script.operations.len(), 1);
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let err = parse("{not json").unwrap_err();
        assert!(err.to_string().contains("test.json"));
    }

    #[test]
    fn test_parse_rejects_empty_app() {
        assert!(parse(r#"{"app": "", "name": "0001_initial"}"#).is_err());
        assert!(parse(r#"{"app": "shop", "name": ""}"#).is_err());
    }

    #[test]
    fn test_build_graph_rejects_unknown_dependency() {
        let script = parse(
            r#"{"app": "shop", "name": "0002_add_price", "dependencies": [["shop", "0001_initial"]]}"#,
        )
        .unwrap();

        assert!(build_graph(vec![script]).is_err());
    }

    #[test]
    fn test_identifier_guard() {
        assert!(validate_identifier("schema_migrations").is_ok());
        assert!(validate_identifier("_private$table").is_ok());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("migrations; DROP TABLE users").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_load_scripts_walks_app_directories() {
        let root = std::env::temp_dir().join(format!("migraudit-loader-{}", uuid::Uuid::new_v4()));
        let shop = root.join("shop");
        fs::create_dir_all(&shop).unwrap();
        fs::write(
            shop.join("0001_initial.json"),
            r#"{"app": "shop", "name": "0001_initial"}"#,
        )
        .unwrap();
        fs::write(
            shop.join("0002_add_price.json"),
            r#"{"app": "shop", "name": "0002_add_price", "dependencies": [["shop", "0001_initial"]]}"#,
        )
        .unwrap();
        fs::write(root.join("notes.txt"), "not a migration").unwrap();

        let scripts = load_scripts(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();

        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].id, MigrationId::new("shop", "0001_initial"));
        assert_eq!(scripts[1].id, MigrationId::new("shop", "0002_add_price"));
    }
}
