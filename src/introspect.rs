//! Live schema introspection
//!
//! Reads the actual schema out of a running PostgreSQL database and folds it
//! onto the canonical model, normalizing raw type spellings through the
//! shared [`TypeMap`] so both comparison sides speak the same vocabulary.

use deadpool_postgres::Pool;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::AuditResult;
use crate::schema::{Column, Schema, Table, TypeMap};

/// Introspect every base table outside the PostgreSQL system schemas
///
/// Tables named in `exclude_tables` are dropped before the rules ever see
/// them. Table names are compared unqualified; on a cross-schema name
/// collision the later schema shadows the earlier one.
pub async fn introspect_schema(
    pool: &Pool,
    types: &TypeMap,
    exclude_tables: &[String],
) -> AuditResult<Schema> {
    let client = pool.get().await?;

    let table_query = r#"
        SELECT t.table_schema, t.table_name
        FROM information_schema.tables t
        WHERE t.table_schema NOT IN ('pg_catalog', 'information_schema')
          AND t.table_type = 'BASE TABLE'
        ORDER BY t.table_schema, t.table_name
    "#;
    let table_rows = client.query(table_query, &[]).await?;

    let mut tables = BTreeMap::new();
    for row in table_rows {
        let schema_name: String = row.get("table_schema");
        let table_name: String = row.get("table_name");
        if exclude_tables.contains(&table_name) {
            continue;
        }

        let columns = get_columns(&client, types, &schema_name, &table_name).await?;
        tables.insert(
            table_name.clone(),
            Table {
                name: table_name,
                columns,
            },
        );
    }

    debug!("Introspected {} tables", tables.len());
    Ok(Schema::new(tables))
}

/// Columns for one table, keyed by name
async fn get_columns(
    client: &deadpool_postgres::Client,
    types: &TypeMap,
    schema_name: &str,
    table_name: &str,
) -> AuditResult<BTreeMap<String, Column>> {
    let query = r#"
        SELECT c.column_name, c.data_type, c.is_nullable, c.column_default
        FROM information_schema.columns c
        WHERE c.table_schema = $1 AND c.table_name = $2
        ORDER BY c.ordinal_position
    "#;
    let rows = client.query(query, &[&schema_name, &table_name]).await?;

    let columns = rows
        .iter()
        .map(|row| {
            let name: String = row.get("column_name");
            let data_type: String = row.get("data_type");
            let column = Column {
                name: name.clone(),
                data_type: types.normalize_db_type(&data_type),
                nullable: row.get::<_, String>("is_nullable") == "YES",
                default_value: row.get("column_default"),
            };
            (name, column)
        })
        .collect();
    Ok(columns)
}
