//! Entity-reference candidate filter.
//!
//! Classifies schema columns as join/entity candidates or exclusions ahead
//! of relationship inference. Every classification carries a reason string
//! that is shown to users reviewing the ontology, so reasons are written as
//! explanations rather than debug codes.

use std::collections::HashMap;

use crate::config::FilteringConfig;
use crate::model::{ColumnMetadata, ColumnPurpose, ColumnStats, SchemaColumn, SchemaTable};

/// One classified column with its user-facing explanation.
#[derive(Debug, Clone)]
pub struct ColumnClassification {
    pub column: SchemaColumn,
    pub reason: String,
}

/// Result of filtering a column set.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub candidates: Vec<ColumnClassification>,
    pub excluded: Vec<ColumnClassification>,
}

/// Name suffixes that mark a column as non-entity data in the legacy
/// pattern variant.
const EXCLUDED_NAME_SUFFIXES: &[&str] = &["_at", "_date", "_status", "_type", "_flag"];
const EXCLUDED_NAME_PREFIXES: &[&str] = &["is_", "has_"];
const IDENTIFIER_NAME_SUFFIXES: &[&str] = &["_id", "_uuid", "_key"];

enum Verdict {
    Candidate(String),
    Excluded(String),
}

/// Classify columns as entity-reference candidates or exclusions.
///
/// `stats_by_column` is keyed by `"table.column"`. `metadata_by_column`
/// (keyed by column id) carries stored purpose annotations; when it is
/// absent the legacy name-pattern rules apply if enabled in config.
pub fn filter_entity_candidates(
    columns: &[SchemaColumn],
    tables_by_id: &HashMap<String, SchemaTable>,
    stats_by_column: &HashMap<String, ColumnStats>,
    metadata_by_column: Option<&HashMap<String, ColumnMetadata>>,
    cfg: &FilteringConfig,
) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for column in columns {
        let Some(table) = tables_by_id.get(&column.table_id) else {
            log::warn!(
                "column {} references unknown table {}, excluding",
                column.name,
                column.table_id
            );
            outcome.excluded.push(ColumnClassification {
                column: column.clone(),
                reason: "owning table not found".to_string(),
            });
            continue;
        };

        let stats = stats_by_column.get(&format!("{}.{}", table.name, column.name));
        let metadata = metadata_by_column.and_then(|m| m.get(&column.id));

        let verdict = classify(column, stats, metadata, metadata_by_column.is_some(), cfg);
        match verdict {
            Verdict::Candidate(reason) => outcome.candidates.push(ColumnClassification {
                column: column.clone(),
                reason,
            }),
            Verdict::Excluded(reason) => outcome.excluded.push(ColumnClassification {
                column: column.clone(),
                reason,
            }),
        }
    }

    outcome
}

fn classify(
    column: &SchemaColumn,
    stats: Option<&ColumnStats>,
    metadata: Option<&ColumnMetadata>,
    has_metadata_pipeline: bool,
    cfg: &FilteringConfig,
) -> Verdict {
    let ratio = match stats {
        Some(s) if s.row_count > 0 => s.distinct_count as f64 / s.row_count as f64,
        _ => 0.0,
    };

    // Stored purpose wins over everything else.
    if let Some(purpose) = metadata.and_then(|m| m.purpose) {
        return match purpose {
            ColumnPurpose::Identifier => {
                Verdict::Candidate("identifier column (stored metadata)".to_string())
            }
            other => Verdict::Excluded(format!("{} column (stored metadata)", other.as_str())),
        };
    }

    // Keys are always entity references, whatever their type or stats.
    if column.is_primary_key {
        return Verdict::Candidate("primary key".to_string());
    }
    if column.is_unique {
        return Verdict::Candidate("unique constraint".to_string());
    }

    let data_type = column.data_type.to_lowercase();
    if data_type.contains("bool") || data_type.contains("timestamp") || data_type.contains("date") {
        return Verdict::Excluded(format!("excluded data type: {}", column.data_type));
    }

    // Legacy name patterns, for datasources with no metadata pipeline.
    if cfg.use_name_patterns && !has_metadata_pipeline {
        let name = column.name.to_lowercase();
        for suffix in EXCLUDED_NAME_SUFFIXES {
            if name.ends_with(suffix) {
                return Verdict::Excluded(format!("excluded name pattern: *{}", suffix));
            }
        }
        for prefix in EXCLUDED_NAME_PREFIXES {
            if name.starts_with(prefix) {
                return Verdict::Excluded(format!("excluded name pattern: {}*", prefix));
            }
        }
        if name == "id" {
            return Verdict::Candidate("identifier name: id".to_string());
        }
        for suffix in IDENTIFIER_NAME_SUFFIXES {
            if name.ends_with(suffix) {
                return Verdict::Candidate(format!("identifier name pattern: *{}", suffix));
            }
        }
    }

    let Some(stats) = stats else {
        return Verdict::Excluded("no statistics available".to_string());
    };

    if stats.distinct_count >= cfg.min_distinct_for_candidate && ratio > cfg.min_distinct_ratio {
        return Verdict::Candidate(format!(
            "{} distinct values ({:.1}% ratio)",
            stats.distinct_count,
            ratio * 100.0
        ));
    }

    if stats.distinct_count < cfg.min_distinct_for_candidate {
        return Verdict::Excluded(format!(
            "low distinct count ({} < {})",
            stats.distinct_count, cfg.min_distinct_for_candidate
        ));
    }

    Verdict::Excluded(format!(
        "low ratio ({:.1}% < {:.0}%)",
        ratio * 100.0,
        cfg.min_distinct_ratio * 100.0
    ))
}
