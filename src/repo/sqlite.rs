//! SQLite-backed implementations of the repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use crate::db::Db;
use crate::error::{OntomapError, Result};
use crate::model::{
    BusinessGlossaryTerm, CandidateStatus, ColumnMetadata, ColumnPurpose, Datasource,
    DetectionMethod, EntityStatus, EntityType, RelationshipCandidate, SchemaColumn, SchemaTable,
    StateData, TermSource, WorkflowEntityState,
};

use super::{
    ColumnMetadataRepository, GlossaryRepository, RelationshipCandidateRepository,
    SchemaRepository, WorkflowStateRepository,
};

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OntomapError::Parse(format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_json_list(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| OntomapError::Parse(format!("bad JSON list: {}", e)))
}

/// Structural schema reads plus the sync-side writes used by the CLI.
pub struct SqliteSchemaRepository {
    db: Arc<Db>,
}

impl SqliteSchemaRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Look up a registered datasource by name.
    pub async fn get_datasource(&self, name: &str) -> Result<Option<Datasource>> {
        let name = name.to_string();
        self.db
            .with_connection(move |conn| {
                let found = conn
                    .query_row(
                        "SELECT id, name, kind, location FROM datasources WHERE name = ?1",
                        params![name],
                        |row| {
                            Ok(Datasource {
                                id: row.get(0)?,
                                name: row.get(1)?,
                                kind: row.get(2)?,
                                location: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(found)
            })
            .await
    }

    /// Register a datasource, returning the existing row when the name is
    /// already known.
    pub async fn ensure_datasource(&self, ds: &Datasource) -> Result<Datasource> {
        let ds = ds.clone();
        self.db
            .with_connection(move |conn| {
                let existing = conn
                    .query_row(
                        "SELECT id, name, kind, location FROM datasources WHERE name = ?1",
                        params![ds.name],
                        |row| {
                            Ok(Datasource {
                                id: row.get(0)?,
                                name: row.get(1)?,
                                kind: row.get(2)?,
                                location: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;

                if let Some(found) = existing {
                    return Ok(found);
                }

                conn.execute(
                    "INSERT INTO datasources (id, name, kind, location) VALUES (?1, ?2, ?3, ?4)",
                    params![ds.id, ds.name, ds.kind, ds.location],
                )?;
                Ok(ds)
            })
            .await
    }

    /// Insert or refresh a discovered table, returning its stored id.
    pub async fn upsert_table(&self, table: &SchemaTable) -> Result<String> {
        let table = table.clone();
        self.db
            .with_connection(move |conn| {
                let existing: Option<String> = conn
                    .query_row(
                        "SELECT id FROM schema_tables WHERE datasource_id = ?1 AND name = ?2",
                        params![table.datasource_id, table.name],
                        |row| row.get(0),
                    )
                    .optional()?;

                if let Some(id) = existing {
                    conn.execute(
                        "UPDATE schema_tables SET row_count = ?1, deleted_at = NULL WHERE id = ?2",
                        params![table.row_count, id],
                    )?;
                    return Ok(id);
                }

                conn.execute(
                    "INSERT INTO schema_tables (id, datasource_id, name, row_count) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![table.id, table.datasource_id, table.name, table.row_count],
                )?;
                Ok(table.id)
            })
            .await
    }

    /// Insert or refresh a discovered column, returning its stored id.
    pub async fn upsert_column(&self, column: &SchemaColumn) -> Result<String> {
        let column = column.clone();
        self.db
            .with_connection(move |conn| {
                let existing: Option<String> = conn
                    .query_row(
                        "SELECT id FROM schema_columns WHERE table_id = ?1 AND name = ?2",
                        params![column.table_id, column.name],
                        |row| row.get(0),
                    )
                    .optional()?;

                if let Some(id) = existing {
                    conn.execute(
                        "UPDATE schema_columns SET data_type = ?1, is_nullable = ?2, \
                         is_primary_key = ?3, is_unique = ?4 WHERE id = ?5",
                        params![
                            column.data_type,
                            column.is_nullable,
                            column.is_primary_key,
                            column.is_unique,
                            id
                        ],
                    )?;
                    return Ok(id);
                }

                conn.execute(
                    "INSERT INTO schema_columns \
                     (id, table_id, name, data_type, is_nullable, is_primary_key, is_unique) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        column.id,
                        column.table_id,
                        column.name,
                        column.data_type,
                        column.is_nullable,
                        column.is_primary_key,
                        column.is_unique
                    ],
                )?;
                Ok(column.id)
            })
            .await
    }
}

fn read_table(row: &rusqlite::Row<'_>) -> rusqlite::Result<(SchemaTable, Option<String>)> {
    let deleted_at: Option<String> = row.get(4)?;
    Ok((
        SchemaTable {
            id: row.get(0)?,
            datasource_id: row.get(1)?,
            name: row.get(2)?,
            row_count: row.get(3)?,
            deleted_at: None,
        },
        deleted_at,
    ))
}

fn read_column(row: &rusqlite::Row<'_>) -> rusqlite::Result<SchemaColumn> {
    Ok(SchemaColumn {
        id: row.get(0)?,
        table_id: row.get(1)?,
        name: row.get(2)?,
        data_type: row.get(3)?,
        is_nullable: row.get(4)?,
        is_primary_key: row.get(5)?,
        is_unique: row.get(6)?,
    })
}

#[async_trait]
impl SchemaRepository for SqliteSchemaRepository {
    async fn list_tables_by_datasource(&self, datasource_id: &str) -> Result<Vec<SchemaTable>> {
        let datasource_id = datasource_id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, datasource_id, name, row_count, deleted_at \
                     FROM schema_tables WHERE datasource_id = ?1 AND deleted_at IS NULL \
                     ORDER BY name",
                )?;
                let rows = stmt.query_map(params![datasource_id], read_table)?;
                let mut out = Vec::new();
                for row in rows {
                    let (mut table, deleted_at) = row.map_err(OntomapError::Database)?;
                    if let Some(raw) = deleted_at {
                        table.deleted_at = Some(parse_timestamp(&raw)?);
                    }
                    out.push(table);
                }
                Ok(out)
            })
            .await
    }

    async fn list_columns_by_datasource(&self, datasource_id: &str) -> Result<Vec<SchemaColumn>> {
        let datasource_id = datasource_id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.table_id, c.name, c.data_type, c.is_nullable, \
                            c.is_primary_key, c.is_unique \
                     FROM schema_columns c \
                     JOIN schema_tables t ON t.id = c.table_id \
                     WHERE t.datasource_id = ?1 AND t.deleted_at IS NULL \
                     ORDER BY t.name, c.name",
                )?;
                let rows = stmt.query_map(params![datasource_id], read_column)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(OntomapError::Database)?);
                }
                Ok(out)
            })
            .await
    }

    async fn get_columns_by_tables(&self, table_ids: &[String]) -> Result<Vec<SchemaColumn>> {
        if table_ids.is_empty() {
            return Ok(Vec::new());
        }
        let table_ids = table_ids.to_vec();
        self.db
            .with_connection(move |conn| {
                let placeholders = table_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let query = format!(
                    "SELECT id, table_id, name, data_type, is_nullable, is_primary_key, is_unique \
                     FROM schema_columns WHERE table_id IN ({}) ORDER BY table_id, name",
                    placeholders
                );
                let mut stmt = conn.prepare(&query)?;
                let rows = stmt.query_map(
                    rusqlite::params_from_iter(table_ids.iter()),
                    read_column,
                )?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(OntomapError::Database)?);
                }
                Ok(out)
            })
            .await
    }
}

/// Workflow entity state rows, `state_data` stored as JSON.
pub struct SqliteWorkflowStateRepository {
    db: Arc<Db>,
}

impl SqliteWorkflowStateRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

fn read_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_state(
    (id, workflow_id, entity_type, entity_key, status, rest): (
        String,
        String,
        String,
        String,
        String,
        String,
    ),
    updated_at: String,
) -> Result<WorkflowEntityState> {
    let entity_type = EntityType::parse(&entity_type)
        .ok_or_else(|| OntomapError::Parse(format!("unknown entity type: {}", entity_type)))?;
    let status = EntityStatus::parse(&status)
        .ok_or_else(|| OntomapError::Parse(format!("unknown entity status: {}", status)))?;
    let state_data: StateData = serde_json::from_str(&rest)
        .map_err(|e| OntomapError::Parse(format!("bad state_data JSON: {}", e)))?;
    Ok(WorkflowEntityState {
        id,
        workflow_id,
        entity_type,
        entity_key,
        status,
        state_data,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl WorkflowStateRepository for SqliteWorkflowStateRepository {
    async fn get_by_entity(
        &self,
        workflow_id: &str,
        entity_type: EntityType,
        entity_key: &str,
    ) -> Result<Option<WorkflowEntityState>> {
        let workflow_id = workflow_id.to_string();
        let entity_key = entity_key.to_string();
        self.db
            .with_connection(move |conn| {
                let found = conn
                    .query_row(
                        "SELECT id, workflow_id, entity_type, entity_key, status, state_data, updated_at \
                         FROM workflow_entity_states \
                         WHERE workflow_id = ?1 AND entity_type = ?2 AND entity_key = ?3",
                        params![workflow_id, entity_type.as_str(), entity_key],
                        |row| {
                            let fields = read_state(row)?;
                            let updated_at: String = row.get(6)?;
                            Ok((fields, updated_at))
                        },
                    )
                    .optional()?;

                match found {
                    Some((fields, updated_at)) => Ok(Some(decode_state(fields, updated_at)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    async fn update(&self, state: &WorkflowEntityState) -> Result<()> {
        let state = state.clone();
        self.db
            .with_connection(move |conn| {
                let state_json = serde_json::to_string(&state.state_data)
                    .map_err(|e| OntomapError::Parse(format!("serialize state_data: {}", e)))?;
                let changed = conn.execute(
                    "UPDATE workflow_entity_states \
                     SET status = ?1, state_data = ?2, updated_at = ?3 \
                     WHERE workflow_id = ?4 AND entity_type = ?5 AND entity_key = ?6",
                    params![
                        state.status.as_str(),
                        state_json,
                        Utc::now().to_rfc3339(),
                        state.workflow_id,
                        state.entity_type.as_str(),
                        state.entity_key
                    ],
                )?;
                if changed == 0 {
                    return Err(OntomapError::NotFound(format!(
                        "workflow state not found: {}",
                        state.entity_key
                    )));
                }
                Ok(())
            })
            .await
    }

    async fn update_status(
        &self,
        workflow_id: &str,
        entity_type: EntityType,
        entity_key: &str,
        status: EntityStatus,
    ) -> Result<()> {
        let workflow_id = workflow_id.to_string();
        let entity_key = entity_key.to_string();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE workflow_entity_states SET status = ?1, updated_at = ?2 \
                     WHERE workflow_id = ?3 AND entity_type = ?4 AND entity_key = ?5",
                    params![
                        status.as_str(),
                        Utc::now().to_rfc3339(),
                        workflow_id,
                        entity_type.as_str(),
                        entity_key
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn create(&self, state: &WorkflowEntityState) -> Result<()> {
        let state = state.clone();
        self.db
            .with_connection(move |conn| {
                let state_json = serde_json::to_string(&state.state_data)
                    .map_err(|e| OntomapError::Parse(format!("serialize state_data: {}", e)))?;
                conn.execute(
                    "INSERT INTO workflow_entity_states \
                     (id, workflow_id, entity_type, entity_key, status, state_data, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        state.id,
                        state.workflow_id,
                        state.entity_type.as_str(),
                        state.entity_key,
                        state.status.as_str(),
                        state_json,
                        state.updated_at.to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await
    }
}

/// Relationship candidate rows.
pub struct SqliteRelationshipCandidateRepository {
    db: Arc<Db>,
}

impl SqliteRelationshipCandidateRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RelationshipCandidateRepository for SqliteRelationshipCandidateRepository {
    async fn get_by_workflow(&self, workflow_id: &str) -> Result<Vec<RelationshipCandidate>> {
        let workflow_id = workflow_id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, workflow_id, source_column_id, target_column_id, \
                            detection_method, confidence, value_match_rate, name_similarity, \
                            status, is_required, created_at \
                     FROM relationship_candidates WHERE workflow_id = ?1 ORDER BY created_at",
                )?;
                let rows = stmt.query_map(params![workflow_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<f64>>(5)?,
                        row.get::<_, Option<f64>>(6)?,
                        row.get::<_, Option<f64>>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, Option<bool>>(9)?,
                        row.get::<_, String>(10)?,
                    ))
                })?;

                let mut out = Vec::new();
                for row in rows {
                    let (
                        id,
                        workflow_id,
                        source_column_id,
                        target_column_id,
                        method,
                        confidence,
                        value_match_rate,
                        name_similarity,
                        status,
                        is_required,
                        created_at,
                    ) = row.map_err(OntomapError::Database)?;
                    out.push(RelationshipCandidate {
                        id,
                        workflow_id,
                        source_column_id,
                        target_column_id,
                        detection_method: DetectionMethod::parse(&method).ok_or_else(|| {
                            OntomapError::Parse(format!("unknown detection method: {}", method))
                        })?,
                        confidence,
                        value_match_rate,
                        name_similarity,
                        status: CandidateStatus::parse(&status).ok_or_else(|| {
                            OntomapError::Parse(format!("unknown candidate status: {}", status))
                        })?,
                        is_required,
                        created_at: parse_timestamp(&created_at)?,
                    });
                }
                Ok(out)
            })
            .await
    }

    async fn create(&self, candidate: &RelationshipCandidate) -> Result<()> {
        let candidate = candidate.clone();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO relationship_candidates \
                     (id, workflow_id, source_column_id, target_column_id, detection_method, \
                      confidence, value_match_rate, name_similarity, status, is_required, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        candidate.id,
                        candidate.workflow_id,
                        candidate.source_column_id,
                        candidate.target_column_id,
                        candidate.detection_method.as_str(),
                        candidate.confidence,
                        candidate.value_match_rate,
                        candidate.name_similarity,
                        candidate.status.as_str(),
                        candidate.is_required,
                        candidate.created_at.to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await
    }
}

/// Glossary term rows, aliases stored as a JSON list.
pub struct SqliteGlossaryRepository {
    db: Arc<Db>,
}

impl SqliteGlossaryRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    fn list_where(
        conn: &Connection,
        datasource_id: &str,
        extra_predicate: &str,
    ) -> Result<Vec<BusinessGlossaryTerm>> {
        let query = format!(
            "SELECT id, datasource_id, term, definition, defining_sql, base_table, \
                    aliases, source, created_at \
             FROM glossary_terms WHERE datasource_id = ?1{} ORDER BY term",
            extra_predicate
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params![datasource_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, datasource_id, term, definition, defining_sql, base_table, aliases, source, created_at) =
                row.map_err(OntomapError::Database)?;
            out.push(BusinessGlossaryTerm {
                id,
                datasource_id,
                term,
                definition,
                defining_sql,
                base_table,
                aliases: parse_json_list(&aliases)?,
                source: TermSource::parse(&source).ok_or_else(|| {
                    OntomapError::Parse(format!("unknown term source: {}", source))
                })?,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl GlossaryRepository for SqliteGlossaryRepository {
    async fn list_terms(&self, datasource_id: &str) -> Result<Vec<BusinessGlossaryTerm>> {
        let datasource_id = datasource_id.to_string();
        self.db
            .with_connection(move |conn| Self::list_where(conn, &datasource_id, ""))
            .await
    }

    async fn list_unenriched(&self, datasource_id: &str) -> Result<Vec<BusinessGlossaryTerm>> {
        let datasource_id = datasource_id.to_string();
        self.db
            .with_connection(move |conn| {
                Self::list_where(
                    conn,
                    &datasource_id,
                    " AND (defining_sql IS NULL OR defining_sql = '') AND source != 'manual'",
                )
            })
            .await
    }

    async fn create(&self, term: &BusinessGlossaryTerm) -> Result<()> {
        let term = term.clone();
        self.db
            .with_connection(move |conn| {
                let aliases = serde_json::to_string(&term.aliases)
                    .map_err(|e| OntomapError::Parse(format!("serialize aliases: {}", e)))?;
                conn.execute(
                    "INSERT INTO glossary_terms \
                     (id, datasource_id, term, definition, defining_sql, base_table, aliases, source, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        term.id,
                        term.datasource_id,
                        term.term,
                        term.definition,
                        term.defining_sql,
                        term.base_table,
                        aliases,
                        term.source.as_str(),
                        term.created_at.to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn update(&self, term: &BusinessGlossaryTerm) -> Result<()> {
        let term = term.clone();
        self.db
            .with_connection(move |conn| {
                let aliases = serde_json::to_string(&term.aliases)
                    .map_err(|e| OntomapError::Parse(format!("serialize aliases: {}", e)))?;
                let changed = conn.execute(
                    "UPDATE glossary_terms \
                     SET definition = ?1, defining_sql = ?2, base_table = ?3, aliases = ?4 \
                     WHERE id = ?5",
                    params![term.definition, term.defining_sql, term.base_table, aliases, term.id],
                )?;
                if changed == 0 {
                    return Err(OntomapError::NotFound(format!(
                        "glossary term not found: {}",
                        term.term
                    )));
                }
                Ok(())
            })
            .await
    }
}

/// Column metadata rows, enum values stored as a JSON list.
pub struct SqliteColumnMetadataRepository {
    db: Arc<Db>,
}

impl SqliteColumnMetadataRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Sync-side write used when annotations arrive from upstream analysis.
    pub async fn upsert(&self, metadata: &ColumnMetadata) -> Result<()> {
        let metadata = metadata.clone();
        self.db
            .with_connection(move |conn| {
                let enum_values = serde_json::to_string(&metadata.enum_values)
                    .map_err(|e| OntomapError::Parse(format!("serialize enum values: {}", e)))?;
                conn.execute(
                    "INSERT INTO column_metadata (column_id, purpose, semantic_type, enum_values) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(column_id) DO UPDATE SET \
                        purpose = excluded.purpose, \
                        semantic_type = excluded.semantic_type, \
                        enum_values = excluded.enum_values",
                    params![
                        metadata.column_id,
                        metadata.purpose.map(|p| p.as_str()),
                        metadata.semantic_type,
                        enum_values
                    ],
                )?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl ColumnMetadataRepository for SqliteColumnMetadataRepository {
    async fn get_by_columns(&self, column_ids: &[String]) -> Result<Vec<ColumnMetadata>> {
        if column_ids.is_empty() {
            return Ok(Vec::new());
        }
        let column_ids = column_ids.to_vec();
        self.db
            .with_connection(move |conn| {
                let placeholders = column_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let query = format!(
                    "SELECT column_id, purpose, semantic_type, enum_values \
                     FROM column_metadata WHERE column_id IN ({})",
                    placeholders
                );
                let mut stmt = conn.prepare(&query)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(column_ids.iter()), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?;

                let mut out = Vec::new();
                for row in rows {
                    let (column_id, purpose, semantic_type, enum_values) =
                        row.map_err(OntomapError::Database)?;
                    out.push(ColumnMetadata {
                        column_id,
                        purpose: purpose.as_deref().and_then(ColumnPurpose::parse),
                        semantic_type,
                        enum_values: parse_json_list(&enum_values)?,
                    });
                }
                Ok(out)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;
    use crate::model::column_entity_key;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn setup_store() -> (Arc<Db>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Db::new(temp_dir.path().join("store.db")));
        db.with_connection(|conn| migrate::run_migrations(conn))
            .await
            .unwrap();
        (db, temp_dir)
    }

    async fn seed_datasource(db: &Arc<Db>) -> Datasource {
        let repo = SqliteSchemaRepository::new(db.clone());
        repo.ensure_datasource(&Datasource {
            id: Uuid::new_v4().to_string(),
            name: "test-ds".to_string(),
            kind: "sqlite".to_string(),
            location: "/tmp/source.db".to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_schema_upsert_and_list() {
        let (db, _tmp) = setup_store().await;
        let ds = seed_datasource(&db).await;
        let repo = SqliteSchemaRepository::new(db.clone());

        let table = SchemaTable {
            id: Uuid::new_v4().to_string(),
            datasource_id: ds.id.clone(),
            name: "users".to_string(),
            row_count: Some(100),
            deleted_at: None,
        };
        let table_id = repo.upsert_table(&table).await.unwrap();

        // Re-upserting the same table name keeps the original id
        let again = repo.upsert_table(&table).await.unwrap();
        assert_eq!(table_id, again);

        repo.upsert_column(&SchemaColumn {
            id: Uuid::new_v4().to_string(),
            table_id: table_id.clone(),
            name: "id".to_string(),
            data_type: "integer".to_string(),
            is_nullable: false,
            is_primary_key: true,
            is_unique: true,
        })
        .await
        .unwrap();

        let tables = repo.list_tables_by_datasource(&ds.id).await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "users");

        let columns = repo.list_columns_by_datasource(&ds.id).await.unwrap();
        assert_eq!(columns.len(), 1);
        assert!(columns[0].is_primary_key);

        let by_table = repo.get_columns_by_tables(&[table_id]).await.unwrap();
        assert_eq!(by_table.len(), 1);
    }

    #[tokio::test]
    async fn test_workflow_state_round_trip() {
        let (db, _tmp) = setup_store().await;
        let repo = SqliteWorkflowStateRepository::new(db.clone());

        let state = WorkflowEntityState {
            id: Uuid::new_v4().to_string(),
            workflow_id: "wf1".to_string(),
            entity_type: EntityType::Column,
            entity_key: column_entity_key("users", "status"),
            status: EntityStatus::Pending,
            state_data: StateData::default(),
            updated_at: Utc::now(),
        };
        repo.create(&state).await.unwrap();

        let loaded = repo
            .get_by_entity("wf1", EntityType::Column, "users.status")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, EntityStatus::Pending);

        let mut updated = loaded;
        updated.status = EntityStatus::Scanned;
        updated.state_data.gathered = Some(crate::model::ColumnProfile {
            row_count: 1000,
            non_null_count: 1000,
            distinct_count: 5,
            null_percent: 0.0,
            sample_values: vec!["active".to_string()],
            is_enum_candidate: true,
        });
        repo.update(&updated).await.unwrap();

        let reloaded = repo
            .get_by_entity("wf1", EntityType::Column, "users.status")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.status, EntityStatus::Scanned);
        assert!(reloaded.state_data.gathered.unwrap().is_enum_candidate);
    }

    #[tokio::test]
    async fn test_workflow_state_unique_per_entity() {
        let (db, _tmp) = setup_store().await;
        let repo = SqliteWorkflowStateRepository::new(db.clone());

        let state = WorkflowEntityState {
            id: Uuid::new_v4().to_string(),
            workflow_id: "wf1".to_string(),
            entity_type: EntityType::Column,
            entity_key: "users.id".to_string(),
            status: EntityStatus::Pending,
            state_data: StateData::default(),
            updated_at: Utc::now(),
        };
        repo.create(&state).await.unwrap();

        let mut dup = state.clone();
        dup.id = Uuid::new_v4().to_string();
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_candidate_round_trip() {
        let (db, _tmp) = setup_store().await;
        let ds = seed_datasource(&db).await;
        let schema = SqliteSchemaRepository::new(db.clone());
        let table_id = schema
            .upsert_table(&SchemaTable {
                id: Uuid::new_v4().to_string(),
                datasource_id: ds.id.clone(),
                name: "orders".to_string(),
                row_count: None,
                deleted_at: None,
            })
            .await
            .unwrap();
        let source = schema
            .upsert_column(&SchemaColumn {
                id: Uuid::new_v4().to_string(),
                table_id: table_id.clone(),
                name: "user_id".to_string(),
                data_type: "integer".to_string(),
                is_nullable: true,
                is_primary_key: false,
                is_unique: false,
            })
            .await
            .unwrap();
        let target = schema
            .upsert_column(&SchemaColumn {
                id: Uuid::new_v4().to_string(),
                table_id,
                name: "id".to_string(),
                data_type: "integer".to_string(),
                is_nullable: false,
                is_primary_key: true,
                is_unique: true,
            })
            .await
            .unwrap();

        let repo = SqliteRelationshipCandidateRepository::new(db.clone());
        repo.create(&RelationshipCandidate {
            id: Uuid::new_v4().to_string(),
            workflow_id: "wf1".to_string(),
            source_column_id: source.clone(),
            target_column_id: target.clone(),
            detection_method: DetectionMethod::NameInference,
            confidence: Some(0.8),
            value_match_rate: None,
            name_similarity: Some(0.8),
            status: CandidateStatus::Pending,
            is_required: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        let found = repo.get_by_workflow("wf1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].detection_method, DetectionMethod::NameInference);
        assert_eq!(found[0].confidence, Some(0.8));
        assert!(repo.get_by_workflow("wf2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_glossary_unenriched_filter() {
        let (db, _tmp) = setup_store().await;
        let ds = seed_datasource(&db).await;
        let repo = SqliteGlossaryRepository::new(db.clone());

        let inferred = BusinessGlossaryTerm {
            id: Uuid::new_v4().to_string(),
            datasource_id: ds.id.clone(),
            term: "Active Users".to_string(),
            definition: "Users active in the last 30 days".to_string(),
            defining_sql: None,
            base_table: None,
            aliases: vec![],
            source: TermSource::Inferred,
            created_at: Utc::now(),
        };
        let manual = BusinessGlossaryTerm {
            id: Uuid::new_v4().to_string(),
            datasource_id: ds.id.clone(),
            term: "Total Revenue".to_string(),
            definition: "Sum of all order totals".to_string(),
            defining_sql: Some("SELECT SUM(total) FROM orders".to_string()),
            base_table: Some("orders".to_string()),
            aliases: vec!["revenue".to_string()],
            source: TermSource::Manual,
            created_at: Utc::now(),
        };
        repo.create(&inferred).await.unwrap();
        repo.create(&manual).await.unwrap();

        let unenriched = repo.list_unenriched(&ds.id).await.unwrap();
        assert_eq!(unenriched.len(), 1);
        assert_eq!(unenriched[0].term, "Active Users");

        let mut enriched = inferred;
        enriched.defining_sql = Some("SELECT COUNT(*) FROM users".to_string());
        repo.update(&enriched).await.unwrap();

        assert!(repo.list_unenriched(&ds.id).await.unwrap().is_empty());
        assert_eq!(repo.list_terms(&ds.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_metadata_round_trip() {
        let (db, _tmp) = setup_store().await;
        let ds = seed_datasource(&db).await;
        let schema = SqliteSchemaRepository::new(db.clone());
        let table_id = schema
            .upsert_table(&SchemaTable {
                id: Uuid::new_v4().to_string(),
                datasource_id: ds.id,
                name: "transactions".to_string(),
                row_count: None,
                deleted_at: None,
            })
            .await
            .unwrap();
        let column_id = schema
            .upsert_column(&SchemaColumn {
                id: Uuid::new_v4().to_string(),
                table_id,
                name: "state".to_string(),
                data_type: "text".to_string(),
                is_nullable: false,
                is_primary_key: false,
                is_unique: false,
            })
            .await
            .unwrap();

        let repo = SqliteColumnMetadataRepository::new(db.clone());
        repo.upsert(&ColumnMetadata {
            column_id: column_id.clone(),
            purpose: Some(ColumnPurpose::Enum),
            semantic_type: Some("transaction state".to_string()),
            enum_values: vec![
                "TRANSACTION_STATE_ENDED".to_string(),
                "TRANSACTION_STATE_WAITING".to_string(),
            ],
        })
        .await
        .unwrap();

        let found = repo.get_by_columns(&[column_id]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].purpose, Some(ColumnPurpose::Enum));
        assert_eq!(found[0].enum_values.len(), 2);
    }
}
