//! Repository traits the inference and glossary pipelines are written
//! against. The store implementations live in [`sqlite`]; tests and external
//! schedulers may substitute their own.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    BusinessGlossaryTerm, ColumnMetadata, EntityStatus, EntityType, RelationshipCandidate,
    SchemaColumn, SchemaTable, WorkflowEntityState,
};

pub mod sqlite;

pub use sqlite::{
    SqliteColumnMetadataRepository, SqliteGlossaryRepository,
    SqliteRelationshipCandidateRepository, SqliteSchemaRepository,
    SqliteWorkflowStateRepository,
};

/// Read access to the discovered structural schema.
#[async_trait]
pub trait SchemaRepository: Send + Sync {
    /// All live (non-deleted) tables of one datasource.
    async fn list_tables_by_datasource(&self, datasource_id: &str) -> Result<Vec<SchemaTable>>;

    /// All columns of all live tables of one datasource.
    async fn list_columns_by_datasource(&self, datasource_id: &str) -> Result<Vec<SchemaColumn>>;

    /// Columns for a specific set of tables.
    async fn get_columns_by_tables(&self, table_ids: &[String]) -> Result<Vec<SchemaColumn>>;
}

/// Per-(workflow, entity) profiling state.
#[async_trait]
pub trait WorkflowStateRepository: Send + Sync {
    /// Look up the single state row for an entity, if it exists.
    async fn get_by_entity(
        &self,
        workflow_id: &str,
        entity_type: EntityType,
        entity_key: &str,
    ) -> Result<Option<WorkflowEntityState>>;

    /// Persist a full state row (status + gathered data).
    async fn update(&self, state: &WorkflowEntityState) -> Result<()>;

    /// Persist only a status transition.
    async fn update_status(
        &self,
        workflow_id: &str,
        entity_type: EntityType,
        entity_key: &str,
        status: EntityStatus,
    ) -> Result<()>;

    /// Create a state row. Fails on a (workflow, entity_type, entity_key)
    /// duplicate.
    async fn create(&self, state: &WorkflowEntityState) -> Result<()>;
}

/// Proposed foreign-key relationships.
#[async_trait]
pub trait RelationshipCandidateRepository: Send + Sync {
    async fn get_by_workflow(&self, workflow_id: &str) -> Result<Vec<RelationshipCandidate>>;

    async fn create(&self, candidate: &RelationshipCandidate) -> Result<()>;
}

/// Business glossary terms.
#[async_trait]
pub trait GlossaryRepository: Send + Sync {
    async fn list_terms(&self, datasource_id: &str) -> Result<Vec<BusinessGlossaryTerm>>;

    /// Terms awaiting enrichment: empty defining SQL and not manually created.
    async fn list_unenriched(&self, datasource_id: &str) -> Result<Vec<BusinessGlossaryTerm>>;

    async fn create(&self, term: &BusinessGlossaryTerm) -> Result<()>;

    async fn update(&self, term: &BusinessGlossaryTerm) -> Result<()>;
}

/// Semantic column annotations. Read-only to the pipelines.
#[async_trait]
pub trait ColumnMetadataRepository: Send + Sync {
    async fn get_by_columns(&self, column_ids: &[String]) -> Result<Vec<ColumnMetadata>>;
}
