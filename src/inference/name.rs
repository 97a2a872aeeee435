//! Name-based foreign-key inference.
//!
//! Proposes relationship candidates from naming conventions: `{table}_id`
//! columns and columns named exactly like another table, resolved through a
//! lookup that also knows singular/plural spellings of every table name.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    CandidateStatus, DetectionMethod, RelationshipCandidate, SchemaColumn, SchemaTable,
};
use crate::text::{normalize_name, pluralize, singularize};
use crate::workflow::{Task, TaskContext};

/// Confidence for `{table}_id` suffix matches.
const SUFFIX_MATCH_CONFIDENCE: f64 = 0.8;
/// Confidence for a column named exactly like a table.
const DIRECT_MATCH_CONFIDENCE: f64 = 0.7;

/// Referenced-table entry in the lookup.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub table_id: String,
    pub table_name: String,
    pub pk_column_id: String,
    pub pk_column_name: String,
}

/// Normalized table name (plus inflected variants) → referenceable table.
pub struct TableLookup {
    entries: HashMap<String, TableRef>,
}

impl TableLookup {
    /// Build the lookup. Tables without a primary key cannot be referenced
    /// and are skipped. Exact names are registered first; singular/plural
    /// variants never overwrite an exact entry.
    pub fn build(tables: &[SchemaTable], columns: &[SchemaColumn]) -> Self {
        let mut entries: HashMap<String, TableRef> = HashMap::new();
        let mut refs = Vec::new();

        for table in tables {
            let pk = columns
                .iter()
                .find(|c| c.table_id == table.id && c.is_primary_key);
            let Some(pk) = pk else {
                log::debug!("table {} has no primary key, not referenceable", table.name);
                continue;
            };
            let table_ref = TableRef {
                table_id: table.id.clone(),
                table_name: table.name.clone(),
                pk_column_id: pk.id.clone(),
                pk_column_name: pk.name.clone(),
            };
            entries.insert(normalize_name(&table.name), table_ref.clone());
            refs.push(table_ref);
        }

        for table_ref in refs {
            let normalized = normalize_name(&table_ref.table_name);
            let singular = singularize(&normalized).into_owned();
            let plural = pluralize(&normalized).into_owned();
            for variant in [singular, plural] {
                if variant != normalized {
                    entries.entry(variant).or_insert_with(|| table_ref.clone());
                }
            }
        }

        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&TableRef> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Proposes FK candidates for a whole datasource from column/table names.
pub struct NameInferenceTask {
    pub workflow_id: String,
    pub project_id: String,
    pub datasource_id: String,
}

impl NameInferenceTask {
    async fn propose(
        &self,
        ctx: &TaskContext,
        seen: &mut HashSet<(String, String)>,
        column: &SchemaColumn,
        target: &TableRef,
        confidence: f64,
    ) {
        if target.table_id == column.table_id {
            return;
        }
        let pair = (column.id.clone(), target.pk_column_id.clone());
        if seen.contains(&pair) {
            return;
        }

        let candidate = RelationshipCandidate {
            id: Uuid::new_v4().to_string(),
            workflow_id: self.workflow_id.clone(),
            source_column_id: column.id.clone(),
            target_column_id: target.pk_column_id.clone(),
            detection_method: DetectionMethod::NameInference,
            confidence: Some(confidence),
            value_match_rate: None,
            name_similarity: Some(confidence),
            status: CandidateStatus::Pending,
            is_required: None,
            created_at: Utc::now(),
        };

        // One bad insert must not sink the rest of the scan.
        match ctx.candidates.create(&candidate).await {
            Ok(()) => {
                log::info!(
                    "name inference: {} -> {}.{} (confidence {:.1})",
                    column.name,
                    target.table_name,
                    target.pk_column_name,
                    confidence
                );
                seen.insert(pair);
            }
            Err(e) => {
                log::warn!(
                    "failed to create candidate {} -> {}: {}",
                    column.name,
                    target.table_name,
                    e
                );
            }
        }
    }
}

#[async_trait]
impl Task for NameInferenceTask {
    fn kind(&self) -> &'static str {
        "name_inference"
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<()> {
        let _scope = ctx.tenant.acquire(&self.project_id).await?;

        let tables = ctx.schema.list_tables_by_datasource(&self.datasource_id).await?;
        let columns = ctx
            .schema
            .list_columns_by_datasource(&self.datasource_id)
            .await?;

        let lookup = TableLookup::build(&tables, &columns);
        log::debug!(
            "name inference over {} columns, {} lookup entries",
            columns.len(),
            lookup.len()
        );

        let mut seen: HashSet<(String, String)> = ctx
            .candidates
            .get_by_workflow(&self.workflow_id)
            .await?
            .into_iter()
            .map(|c| (c.source_column_id, c.target_column_id))
            .collect();

        for column in columns.iter().filter(|c| !c.is_primary_key) {
            let name = normalize_name(&column.name);

            // Pattern A: {table}_id
            if let Some(base) = name.strip_suffix("_id") {
                if !base.is_empty() {
                    if let Some(target) = lookup.get(base) {
                        self.propose(ctx, &mut seen, column, target, SUFFIX_MATCH_CONFIDENCE)
                            .await;
                    }
                }
            }

            // Pattern B: column named exactly like a table
            if let Some(target) = lookup.get(&name) {
                self.propose(ctx, &mut seen, column, target, DIRECT_MATCH_CONFIDENCE)
                    .await;
            }
        }

        Ok(())
    }
}
