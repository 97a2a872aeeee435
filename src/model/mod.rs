//! Ontology domain types: schema structure, workflow state, relationship
//! candidates and business-glossary terms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered customer datasource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datasource {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub name: String,
    /// Adapter kind, e.g. `sqlite`.
    pub kind: String,
    /// Connection location (file path or DSN).
    pub location: String,
}

/// Structural description of a customer database table.
///
/// Owned by the schema-discovery subsystem; read-only to the inference tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaTable {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub datasource_id: String,
    pub name: String,
    pub row_count: Option<i64>,
    /// Set when the table disappeared from the source schema.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Structural description of a customer database column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub table_id: String,
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_unique: bool,
}

/// Counts produced by profiling a single column.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ColumnStats {
    pub row_count: i64,
    pub non_null_count: i64,
    pub distinct_count: i64,
}

/// Semantic annotation for a schema column. Read-only input to column
/// filtering and enum-literal validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub column_id: String,
    pub purpose: Option<ColumnPurpose>,
    pub semantic_type: Option<String>,
    /// Exact allowed literals for enum-like columns.
    pub enum_values: Vec<String>,
}

/// Stored purpose classification for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnPurpose {
    Identifier,
    Timestamp,
    Flag,
    Enum,
    Measure,
    Text,
    Json,
}

impl ColumnPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnPurpose::Identifier => "identifier",
            ColumnPurpose::Timestamp => "timestamp",
            ColumnPurpose::Flag => "flag",
            ColumnPurpose::Enum => "enum",
            ColumnPurpose::Measure => "measure",
            ColumnPurpose::Text => "text",
            ColumnPurpose::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "identifier" => Some(ColumnPurpose::Identifier),
            "timestamp" => Some(ColumnPurpose::Timestamp),
            "flag" => Some(ColumnPurpose::Flag),
            "enum" => Some(ColumnPurpose::Enum),
            "measure" => Some(ColumnPurpose::Measure),
            "text" => Some(ColumnPurpose::Text),
            "json" => Some(ColumnPurpose::Json),
            _ => None,
        }
    }
}

/// Kind of entity a workflow state row tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Table,
    Column,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Table => "table",
            EntityType::Column => "column",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "table" => Some(EntityType::Table),
            "column" => Some(EntityType::Column),
            _ => None,
        }
    }
}

/// Profiling progress for one entity within one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Pending,
    Scanned,
    Analyzed,
    Failed,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Pending => "pending",
            EntityStatus::Scanned => "scanned",
            EntityStatus::Analyzed => "analyzed",
            EntityStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EntityStatus::Pending),
            "scanned" => Some(EntityStatus::Scanned),
            "analyzed" => Some(EntityStatus::Analyzed),
            "failed" => Some(EntityStatus::Failed),
            _ => None,
        }
    }
}

/// Typed results of profiling one column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub row_count: i64,
    pub non_null_count: i64,
    pub distinct_count: i64,
    pub null_percent: f64,
    pub sample_values: Vec<String>,
    pub is_enum_candidate: bool,
}

/// Gathered data attached to a workflow entity state.
///
/// The typed profile covers everything the pipeline produces today; the
/// extras map is an escape hatch for fields added by newer writers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateData {
    pub gathered: Option<ColumnProfile>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extras: HashMap<String, serde_json::Value>,
}

/// Per-(workflow, entity) record tracking profiling progress.
///
/// Invariant: exactly one row per (workflow_id, entity_type, entity_key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEntityState {
    pub id: String,
    pub workflow_id: String,
    pub entity_type: EntityType,
    /// `"table.column"` for columns, `"table"` for tables.
    pub entity_key: String,
    pub status: EntityStatus,
    pub state_data: StateData,
    pub updated_at: DateTime<Utc>,
}

/// Algorithm that produced a relationship candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    NameInference,
    ValueMatch,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::NameInference => "name_inference",
            DetectionMethod::ValueMatch => "value_match",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name_inference" => Some(DetectionMethod::NameInference),
            "value_match" => Some(DetectionMethod::ValueMatch),
            _ => None,
        }
    }
}

/// Review status of a relationship candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Approved,
    Rejected,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Approved => "approved",
            CandidateStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CandidateStatus::Pending),
            "approved" => Some(CandidateStatus::Approved),
            "rejected" => Some(CandidateStatus::Rejected),
            _ => None,
        }
    }
}

/// A proposed foreign-key relationship between two columns.
///
/// Unique per (workflow, source_column, target_column); each detection method
/// inserts its own row. Source and target tables always differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipCandidate {
    pub id: String,
    pub workflow_id: String,
    pub source_column_id: String,
    pub target_column_id: String,
    pub detection_method: DetectionMethod,
    /// Name-inference confidence, 0-1.
    pub confidence: Option<f64>,
    /// Sample overlap rate for value-match candidates, 0-1.
    pub value_match_rate: Option<f64>,
    pub name_similarity: Option<f64>,
    pub status: CandidateStatus,
    /// Filled by the downstream analysis step.
    pub is_required: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// How a glossary term entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermSource {
    Manual,
    Inferred,
}

impl TermSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermSource::Manual => "manual",
            TermSource::Inferred => "inferred",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(TermSource::Manual),
            "inferred" => Some(TermSource::Inferred),
            _ => None,
        }
    }
}

/// A named business metric.
///
/// Discovered terms start without SQL; enrichment fills `defining_sql`,
/// which must return exactly one row when executed. Manual terms carry
/// SQL from creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessGlossaryTerm {
    pub id: String,
    pub datasource_id: String,
    pub term: String,
    pub definition: String,
    pub defining_sql: Option<String>,
    pub base_table: Option<String>,
    pub aliases: Vec<String>,
    pub source: TermSource,
    pub created_at: DateTime<Utc>,
}

impl BusinessGlossaryTerm {
    /// Terms still waiting for the enrichment phase.
    pub fn needs_enrichment(&self) -> bool {
        self.source != TermSource::Manual
            && self.defining_sql.as_deref().unwrap_or("").is_empty()
    }
}

/// Entity key for a column state row: `"table.column"`.
pub fn column_entity_key(table: &str, column: &str) -> String {
    format!("{}.{}", table, column)
}
