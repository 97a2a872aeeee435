//! Value-overlap foreign-key inference.
//!
//! Confirms or proposes relationships from actual data: sampled distinct
//! values of a source column are tested against the sampled values of
//! candidate target keys, and pairs with a high enough overlap rate become
//! `value_match` candidates.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::config::MatchingConfig;
use crate::error::Result;
use crate::model::{
    column_entity_key, CandidateStatus, DetectionMethod, EntityType, RelationshipCandidate,
    SchemaColumn,
};
use crate::workflow::{Task, TaskContext};

/// Data types that cannot participate in join matching.
fn is_excluded_type(data_type: &str) -> bool {
    let ty = data_type.to_lowercase();
    ty.starts_with("timestamp")
        || ty.starts_with("date")
        || ty.starts_with("bool")
        || ty.starts_with("json")
}

/// A column is joinable when its type is comparable and it is either a key
/// or has enough distinct values to discriminate rows. Low-cardinality
/// non-key columns (status flags and the like) produce meaningless overlap
/// even when numerically typed; primary keys stay joinable regardless of
/// cardinality because small tables have small key sets.
pub fn is_joinable(column: &SchemaColumn, distinct_count: i64, cfg: &MatchingConfig) -> bool {
    if is_excluded_type(&column.data_type) {
        return false;
    }
    column.is_primary_key || distinct_count > cfg.low_cardinality_threshold
}

/// Fraction of source sample values present in the target sample.
/// An empty source sample matches nothing.
pub fn compute_match_rate(source: &[String], target: &[String]) -> f64 {
    if source.is_empty() {
        return 0.0;
    }
    let target_set: HashSet<&str> = target.iter().map(String::as_str).collect();
    let matched = source
        .iter()
        .filter(|v| target_set.contains(v.as_str()))
        .count();
    matched as f64 / source.len() as f64
}

/// Column plus the sample values gathered for it during the scan phase.
struct SampledColumn {
    column: SchemaColumn,
    samples: Vec<String>,
}

/// Tests candidate FK pairs by sampled value overlap for a whole workflow.
pub struct ValueMatchTask {
    pub workflow_id: String,
    pub project_id: String,
    pub datasource_id: String,
}

#[async_trait]
impl Task for ValueMatchTask {
    fn kind(&self) -> &'static str {
        "value_match"
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<()> {
        let _scope = ctx.tenant.acquire(&self.project_id).await?;

        let tables = ctx.schema.list_tables_by_datasource(&self.datasource_id).await?;
        let columns = ctx
            .schema
            .list_columns_by_datasource(&self.datasource_id)
            .await?;

        let table_names: HashMap<&str, &str> = tables
            .iter()
            .map(|t| (t.id.as_str(), t.name.as_str()))
            .collect();

        // Pull each column's scanned profile; columns without one simply
        // don't participate this run.
        let mut sampled = Vec::new();
        for column in columns {
            let Some(table_name) = table_names.get(column.table_id.as_str()) else {
                continue;
            };
            let entity_key = column_entity_key(table_name, &column.name);
            let Some(state) = ctx
                .states
                .get_by_entity(&self.workflow_id, EntityType::Column, &entity_key)
                .await?
            else {
                continue;
            };
            let Some(profile) = state.state_data.gathered else {
                continue;
            };

            if !is_joinable(&column, profile.distinct_count, &ctx.matching) {
                continue;
            }
            sampled.push(SampledColumn {
                column,
                samples: profile.sample_values,
            });
        }

        log::debug!("value match over {} joinable columns", sampled.len());

        let mut seen: HashSet<(String, String)> = ctx
            .candidates
            .get_by_workflow(&self.workflow_id)
            .await?
            .into_iter()
            .filter(|c| c.detection_method == DetectionMethod::ValueMatch)
            .map(|c| (c.source_column_id, c.target_column_id))
            .collect();

        for source in &sampled {
            if source.samples.is_empty() {
                continue;
            }
            for target in sampled.iter().filter(|t| t.column.is_primary_key) {
                if target.column.table_id == source.column.table_id {
                    continue;
                }
                let pair = (source.column.id.clone(), target.column.id.clone());
                if seen.contains(&pair) {
                    continue;
                }

                let rate = compute_match_rate(&source.samples, &target.samples);
                if rate < ctx.matching.min_value_match_rate {
                    continue;
                }

                let candidate = RelationshipCandidate {
                    id: Uuid::new_v4().to_string(),
                    workflow_id: self.workflow_id.clone(),
                    source_column_id: source.column.id.clone(),
                    target_column_id: target.column.id.clone(),
                    detection_method: DetectionMethod::ValueMatch,
                    confidence: None,
                    value_match_rate: Some(rate),
                    name_similarity: None,
                    status: CandidateStatus::Pending,
                    is_required: None,
                    created_at: Utc::now(),
                };

                match ctx.candidates.create(&candidate).await {
                    Ok(()) => {
                        log::info!(
                            "value match: {} -> {} ({:.0}% overlap)",
                            source.column.name,
                            target.column.name,
                            rate * 100.0
                        );
                        seen.insert(pair);
                    }
                    Err(e) => {
                        log::warn!(
                            "failed to create value-match candidate {} -> {}: {}",
                            source.column.name,
                            target.column.name,
                            e
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
