//! Column scan task: profiles one column and records the results in the
//! workflow's entity state.

use async_trait::async_trait;

use crate::datasource::DatasourceConfig;
use crate::error::{OntomapError, Result};
use crate::model::{column_entity_key, EntityStatus, EntityType};
use crate::workflow::{Task, TaskContext};

use super::build_profile;

/// Scans a single column: `Pending → Scanned`.
///
/// Each instance owns exactly one column's state row; the scheduler may run
/// scans for different columns concurrently.
pub struct ColumnScanTask {
    pub workflow_id: String,
    pub project_id: String,
    pub datasource: DatasourceConfig,
    pub table_name: String,
    pub column_name: String,
}

#[async_trait]
impl Task for ColumnScanTask {
    fn kind(&self) -> &'static str {
        "column_scan"
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<()> {
        let _scope = ctx.tenant.acquire(&self.project_id).await?;

        let entity_key = column_entity_key(&self.table_name, &self.column_name);

        let mut state = ctx
            .states
            .get_by_entity(&self.workflow_id, EntityType::Column, &entity_key)
            .await?
            .ok_or_else(|| {
                OntomapError::NotFound(format!(
                    "column workflow state not found: {}.{}",
                    self.table_name, self.column_name
                ))
            })?;

        let discoverer = ctx.discoverers.create(&self.datasource)?;

        let stats = discoverer
            .analyze_column_stats(&self.table_name, &self.column_name)
            .await
            .map_err(|e| {
                OntomapError::Datasource(format!("analyze column stats for {}: {}", entity_key, e))
            })?;

        // A failed sample fetch does not invalidate the counts; binary
        // columns, for example, may refuse a text scan.
        let sample_values = match discoverer
            .get_distinct_values(
                &self.table_name,
                &self.column_name,
                ctx.profiling.sample_limit,
            )
            .await
        {
            Ok(values) => values,
            Err(e) => {
                log::warn!("sampling {} failed, continuing without samples: {}", entity_key, e);
                Vec::new()
            }
        };

        let profile = build_profile(&stats, sample_values, &ctx.profiling);
        log::debug!(
            "scanned {}: {} rows, {} distinct, {:.1}% null, enum_candidate={}",
            entity_key,
            profile.row_count,
            profile.distinct_count,
            profile.null_percent,
            profile.is_enum_candidate
        );

        state.state_data.gathered = Some(profile);
        state.status = EntityStatus::Scanned;
        ctx.states.update(&state).await?;

        Ok(())
    }
}
