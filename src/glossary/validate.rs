//! Validation of candidate defining SQL.
//!
//! A glossary term's defining query must reference only real columns, use
//! enum literals verbatim, agree semantically with the term's name, and
//! return exactly one row when executed. Outcomes are structured results so
//! callers can tell "the system failed" apart from "this SQL is invalid".

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::datasource::QueryExecutor;

use super::columns::validate_column_references;
use super::enums::check_enum_literals;
use super::tokenizer::{tokenize, TokenKind};

/// Matches term names like "Average Session Length per User".
fn average_per_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\baverage\b.*\bper\b").expect("Invalid regex pattern"))
}

/// Outcome of test-executing candidate SQL.
#[derive(Debug, Clone, Default)]
pub struct TestSqlResult {
    pub valid: bool,
    pub error: Option<String>,
    /// Rows the query produced, when it executed.
    pub row_count: Option<usize>,
    /// Output column names, when the query executed.
    pub columns: Vec<String>,
}

impl TestSqlResult {
    fn invalid(error: String) -> Self {
        Self {
            valid: false,
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Detect a `UNION`/`UNION ALL` at the top level of the query.
///
/// A union wrapped in a subquery under an aggregating outer query is fine;
/// one at depth zero concatenates result sets directly and cannot be a
/// single-row definition.
pub fn has_top_level_union(sql: &str) -> bool {
    let mut depth: i32 = 0;
    for token in tokenize(sql) {
        match token.kind {
            TokenKind::Symbol => {
                if token.is_symbol('(') {
                    depth += 1;
                } else if token.is_symbol(')') {
                    depth = depth.saturating_sub(1).max(0);
                }
            }
            TokenKind::Word => {
                if depth == 0 && token.is_word("union") {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Test-execute candidate SQL and enforce the single-row contract.
pub async fn test_sql(executor: &dyn QueryExecutor, sql: &str) -> TestSqlResult {
    if sql.trim().is_empty() {
        return TestSqlResult::invalid("defining SQL is empty".to_string());
    }

    if has_top_level_union(sql) {
        return TestSqlResult::invalid(
            "top-level UNION produces multiple rows; wrap it in an aggregating outer query"
                .to_string(),
        );
    }

    let result = match executor.query(sql).await {
        Ok(result) => result,
        Err(e) => return TestSqlResult::invalid(format!("execution failed: {}", e)),
    };

    let row_count = result.rows.len();
    match row_count {
        1 => TestSqlResult {
            valid: true,
            error: None,
            row_count: Some(1),
            columns: result.columns,
        },
        0 => TestSqlResult {
            valid: false,
            error: Some("query returned no rows; expected exactly one row".to_string()),
            row_count: Some(0),
            columns: result.columns,
        },
        n => TestSqlResult {
            valid: false,
            error: Some(format!(
                "query returned multiple rows ({}); expected exactly one row",
                n
            )),
            row_count: Some(n),
            columns: result.columns,
        },
    }
}

/// Formula-semantics heuristic: an "average ... per ..." metric divides by a
/// group count, so its SQL must contain a COUNT somewhere.
pub fn check_formula_semantics(term_name: &str, sql: &str) -> Option<String> {
    if !average_per_pattern().is_match(term_name) {
        return None;
    }

    let has_count = tokenize(sql).iter().any(|t| t.is_word("count"));
    if has_count {
        return None;
    }

    Some(format!(
        "term '{}' is an average per group but the SQL contains no COUNT; \
         the denominator should count group members",
        term_name
    ))
}

/// Run the full validation chain, returning the first failure as a
/// user-facing message (which becomes the repair context for the retry
/// prompt).
pub async fn validate_defining_sql(
    term_name: &str,
    sql: &str,
    schema: &HashMap<String, Vec<String>>,
    enum_columns: &HashMap<String, Vec<String>>,
    executor: &dyn QueryExecutor,
) -> Result<(), String> {
    if sql.trim().is_empty() {
        return Err("defining SQL is empty".to_string());
    }

    let reference_errors = validate_column_references(sql, schema);
    if !reference_errors.is_empty() {
        let messages: Vec<&str> = reference_errors.iter().map(|e| e.message.as_str()).collect();
        return Err(messages.join("; "));
    }

    let enum_mismatches = check_enum_literals(sql, enum_columns);
    if !enum_mismatches.is_empty() {
        let messages: Vec<&str> = enum_mismatches.iter().map(|m| m.message.as_str()).collect();
        return Err(messages.join("; "));
    }

    if let Some(warning) = check_formula_semantics(term_name, sql) {
        return Err(warning);
    }

    let result = test_sql(executor, sql).await;
    if !result.valid {
        return Err(result
            .error
            .unwrap_or_else(|| "query execution failed".to_string()));
    }

    Ok(())
}
