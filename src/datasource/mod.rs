//! Customer-datasource adapters: schema discovery, column statistics and
//! read-only query execution against the source database.

use async_trait::async_trait;

use crate::error::{OntomapError, Result};
use crate::model::ColumnStats;

pub mod sqlite;

pub use sqlite::SqliteDatasource;

/// Adapter kind + connection location, resolved by the factory.
#[derive(Debug, Clone)]
pub struct DatasourceConfig {
    pub kind: String,
    pub location: String,
}

/// A column discovered directly from the source database.
#[derive(Debug, Clone)]
pub struct DiscoveredColumn {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
}

/// A table discovered directly from the source database.
#[derive(Debug, Clone)]
pub struct DiscoveredTable {
    pub name: String,
    pub columns: Vec<DiscoveredColumn>,
}

/// Result of executing a query against the source database.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Per-datasource schema discovery and column profiling.
#[async_trait]
pub trait SchemaDiscoverer: Send + Sync {
    /// Row/non-null/distinct counts for a single column.
    async fn analyze_column_stats(&self, table: &str, column: &str) -> Result<ColumnStats>;

    /// Bounded sample of distinct values, rendered as strings.
    async fn get_distinct_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> Result<Vec<String>>;

    /// Enumerate tables and columns present in the source.
    async fn discover_schema(&self) -> Result<Vec<DiscoveredTable>>;
}

/// Read-only query execution, used to test-execute candidate glossary SQL.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, sql: &str) -> Result<QueryResult>;
}

/// Builds the adapter for a datasource configuration.
pub trait DiscovererFactory: Send + Sync {
    fn create(&self, config: &DatasourceConfig) -> Result<Box<dyn SchemaDiscoverer>>;

    fn create_executor(&self, config: &DatasourceConfig) -> Result<Box<dyn QueryExecutor>>;
}

/// Factory for the adapters bundled with this crate.
#[derive(Debug, Default)]
pub struct DefaultDiscovererFactory;

impl DiscovererFactory for DefaultDiscovererFactory {
    fn create(&self, config: &DatasourceConfig) -> Result<Box<dyn SchemaDiscoverer>> {
        match config.kind.as_str() {
            "sqlite" => Ok(Box::new(SqliteDatasource::new(&config.location))),
            other => Err(OntomapError::Datasource(format!(
                "unsupported datasource kind: {}",
                other
            ))),
        }
    }

    fn create_executor(&self, config: &DatasourceConfig) -> Result<Box<dyn QueryExecutor>> {
        match config.kind.as_str() {
            "sqlite" => Ok(Box::new(SqliteDatasource::new(&config.location))),
            other => Err(OntomapError::Datasource(format!(
                "unsupported datasource kind: {}",
                other
            ))),
        }
    }
}
