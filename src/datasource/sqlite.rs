//! SQLite datasource adapter.
//!
//! Treats a SQLite file as the customer database: schema discovery via
//! `sqlite_master` and `PRAGMA table_info`, statistics via COUNT queries,
//! samples via bounded `SELECT DISTINCT`.

use async_trait::async_trait;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;

use crate::error::{OntomapError, Result};
use crate::model::ColumnStats;

use super::{DiscoveredColumn, DiscoveredTable, QueryExecutor, QueryResult, SchemaDiscoverer};

/// Adapter over a SQLite file. Opens a fresh read-only connection per call
/// on the blocking pool, mirroring the store's connection discipline.
pub struct SqliteDatasource {
    path: PathBuf,
}

impl SqliteDatasource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn with_source<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let conn = Connection::open_with_flags(
                &path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
            )
            .map_err(|e| OntomapError::Datasource(format!("open {}: {}", path.display(), e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| {
            OntomapError::Datasource(format!("datasource task failed: {}", e))
        })?
    }
}

/// Quote an identifier for embedding in SQL ("" doubles embedded quotes).
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_to_json(value: rusqlite::types::ValueRef<'_>) -> serde_json::Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => serde_json::Value::String("<blob>".to_string()),
    }
}

#[async_trait]
impl SchemaDiscoverer for SqliteDatasource {
    async fn analyze_column_stats(&self, table: &str, column: &str) -> Result<ColumnStats> {
        let query = format!(
            "SELECT COUNT(*), COUNT({col}), COUNT(DISTINCT {col}) FROM {table}",
            col = quote_ident(column),
            table = quote_ident(table),
        );
        self.with_source(move |conn| {
            let stats = conn
                .query_row(&query, [], |row| {
                    Ok(ColumnStats {
                        row_count: row.get(0)?,
                        non_null_count: row.get(1)?,
                        distinct_count: row.get(2)?,
                    })
                })
                .map_err(|e| OntomapError::Datasource(format!("analyze column stats: {}", e)))?;
            Ok(stats)
        })
        .await
    }

    async fn get_distinct_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let query = format!(
            "SELECT DISTINCT CAST({col} AS TEXT) FROM {table} \
             WHERE {col} IS NOT NULL LIMIT {limit}",
            col = quote_ident(column),
            table = quote_ident(table),
            limit = limit,
        );
        self.with_source(move |conn| {
            let mut stmt = conn
                .prepare(&query)
                .map_err(|e| OntomapError::Datasource(format!("get distinct values: {}", e)))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| OntomapError::Datasource(format!("get distinct values: {}", e)))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| {
                    OntomapError::Datasource(format!("get distinct values: {}", e))
                })?);
            }
            Ok(out)
        })
        .await
    }

    async fn discover_schema(&self) -> Result<Vec<DiscoveredTable>> {
        self.with_source(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )
                .map_err(|e| OntomapError::Datasource(format!("list tables: {}", e)))?;
            let names: Vec<String> = stmt
                .query_map([], |row| row.get(0))
                .map_err(|e| OntomapError::Datasource(format!("list tables: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| OntomapError::Datasource(format!("list tables: {}", e)))?;

            let mut tables = Vec::with_capacity(names.len());
            for name in names {
                let mut info = conn
                    .prepare(&format!("PRAGMA table_info({})", quote_ident(&name)))
                    .map_err(|e| OntomapError::Datasource(format!("table info: {}", e)))?;
                let columns = info
                    .query_map([], |row| {
                        let data_type: String = row.get(2)?;
                        let not_null: bool = row.get(3)?;
                        let pk: i64 = row.get(5)?;
                        Ok(DiscoveredColumn {
                            name: row.get(1)?,
                            data_type: data_type.to_lowercase(),
                            is_nullable: !not_null,
                            is_primary_key: pk > 0,
                        })
                    })
                    .map_err(|e| OntomapError::Datasource(format!("table info: {}", e)))?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| OntomapError::Datasource(format!("table info: {}", e)))?;

                tables.push(DiscoveredTable { name, columns });
            }
            Ok(tables)
        })
        .await
    }
}

#[async_trait]
impl QueryExecutor for SqliteDatasource {
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let sql = sql.to_string();
        self.with_source(move |conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| OntomapError::Datasource(format!("prepare query: {}", e)))?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(|c| c.to_string())
                .collect();
            let column_count = columns.len();

            let mut rows = stmt
                .query([])
                .map_err(|e| OntomapError::Datasource(format!("execute query: {}", e)))?;
            let mut out = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| OntomapError::Datasource(format!("read row: {}", e)))?
            {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let value = row
                        .get_ref(i)
                        .map_err(|e| OntomapError::Datasource(format!("read value: {}", e)))?;
                    values.push(value_to_json(value));
                }
                out.push(values);
            }

            Ok(QueryResult { columns, rows: out })
        })
        .await
    }
}
