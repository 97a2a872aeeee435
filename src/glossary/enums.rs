//! Enum-literal validation.
//!
//! Stored column metadata carries the exact allowed literals for enum-like
//! columns. Generated SQL must compare against those literals verbatim; a
//! near-miss (`'ended'` against `TRANSACTION_STATE_ENDED`) is reported with
//! the best matching allowed value, never rewritten silently.

use std::collections::HashMap;

use crate::text::levenshtein;

use super::tokenizer::{tokenize, Token, TokenKind};

/// A literal that does not match any allowed value of its enum column.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMismatch {
    pub column: String,
    pub literal: String,
    /// Closest allowed value, for a "did you mean" message.
    pub best_match: Option<String>,
    pub message: String,
}

/// Find the allowed value closest to `literal`: case-insensitive equality
/// first, then suffix match (enum constants often embed a prefix), then
/// substring, then edit distance.
pub fn best_enum_match(literal: &str, allowed: &[String]) -> Option<String> {
    if allowed.is_empty() {
        return None;
    }

    let literal_upper = literal.to_uppercase();

    if let Some(exact) = allowed.iter().find(|v| v.to_uppercase() == literal_upper) {
        return Some(exact.clone());
    }

    if let Some(suffix) = allowed.iter().find(|v| {
        let upper = v.to_uppercase();
        upper.ends_with(&format!("_{}", literal_upper)) || upper.ends_with(&literal_upper)
    }) {
        return Some(suffix.clone());
    }

    if let Some(containing) = allowed
        .iter()
        .find(|v| v.to_uppercase().contains(&literal_upper))
    {
        return Some(containing.clone());
    }

    allowed
        .iter()
        .min_by_key(|v| levenshtein::distance(&literal_upper, &v.to_uppercase()))
        .cloned()
}

/// Check every comparison of an enum column against the column's allowed
/// values. Handles `col = 'x'`, `col != 'x'`, `col <> 'x'` and
/// `col IN ('a', 'b')`, including inside `FILTER (WHERE ...)` clauses
/// (which tokenize identically).
pub fn check_enum_literals(
    sql: &str,
    enum_columns: &HashMap<String, Vec<String>>,
) -> Vec<EnumMismatch> {
    let tokens = tokenize(sql);
    let mut mismatches = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Word && token.kind != TokenKind::QuotedIdent {
            continue;
        }
        let column = token.lower();
        let Some(allowed) = enum_columns.get(&column) else {
            continue;
        };

        for literal in comparison_literals(&tokens, i + 1) {
            if allowed.contains(&literal) {
                continue;
            }
            let best_match = best_enum_match(&literal, allowed);
            let message = match &best_match {
                Some(best) => format!(
                    "'{}' is not an allowed value for column '{}'; did you mean '{}'?",
                    literal, column, best
                ),
                None => format!(
                    "'{}' is not an allowed value for column '{}'",
                    literal, column
                ),
            };
            mismatches.push(EnumMismatch {
                column: column.clone(),
                literal,
                best_match,
                message,
            });
        }
    }

    mismatches
}

/// Literals compared against the column whose token ends at `start - 1`.
fn comparison_literals(tokens: &[Token], start: usize) -> Vec<String> {
    let mut literals = Vec::new();

    let Some(op) = tokens.get(start) else {
        return literals;
    };

    // col = 'x' / col != 'x' / col <> 'x'
    if op.is_symbol('=') || op.is_symbol('!') || op.is_symbol('<') {
        let mut j = start + 1;
        // Skip the second half of two-character operators
        while tokens
            .get(j)
            .map(|t| t.is_symbol('=') || t.is_symbol('>'))
            .unwrap_or(false)
        {
            j += 1;
        }
        if let Some(value) = tokens.get(j) {
            if value.kind == TokenKind::StringLiteral {
                literals.push(value.text.clone());
            }
        }
        return literals;
    }

    // col IN ('a', 'b', ...)
    if op.is_word("in") {
        let mut j = start + 1;
        if !tokens.get(j).map(|t| t.is_symbol('(')).unwrap_or(false) {
            return literals;
        }
        j += 1;
        while let Some(t) = tokens.get(j) {
            if t.is_symbol(')') {
                break;
            }
            if t.kind == TokenKind::StringLiteral {
                literals.push(t.text.clone());
            }
            j += 1;
        }
    }

    literals
}
