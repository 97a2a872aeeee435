//! Column profiling: derived statistics and the scan task.

use crate::config::ProfilingConfig;
use crate::model::{ColumnProfile, ColumnStats};

pub mod scan;

pub use scan::ColumnScanTask;

/// Percentage of NULL values; 0 for an empty column.
pub fn null_percent(row_count: i64, non_null_count: i64) -> f64 {
    if row_count <= 0 {
        return 0.0;
    }
    (row_count - non_null_count) as f64 / row_count as f64 * 100.0
}

/// A column is enum-like when it holds a handful of distinct values covering
/// a tiny fraction of rows (status flags, state machines, categories).
pub fn is_enum_candidate(stats: &ColumnStats, cfg: &ProfilingConfig) -> bool {
    if stats.distinct_count <= 0 || stats.row_count <= 0 {
        return false;
    }
    stats.distinct_count <= cfg.enum_max_distinct
        && (stats.distinct_count as f64 / stats.row_count as f64) <= cfg.enum_max_ratio
}

/// Assemble the typed profile written into workflow state.
pub fn build_profile(
    stats: &ColumnStats,
    sample_values: Vec<String>,
    cfg: &ProfilingConfig,
) -> ColumnProfile {
    ColumnProfile {
        row_count: stats.row_count,
        non_null_count: stats.non_null_count,
        distinct_count: stats.distinct_count,
        null_percent: null_percent(stats.row_count, stats.non_null_count),
        sample_values,
        is_enum_candidate: is_enum_candidate(stats, cfg),
    }
}
