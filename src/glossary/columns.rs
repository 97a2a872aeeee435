//! Column-reference validation for candidate defining SQL.
//!
//! Tokenizes the query, resolves table aliases from `FROM`/`JOIN` clauses,
//! and checks every bare identifier against the live schema. Unknown
//! identifiers get a nearest-column suggestion by edit distance.

use std::collections::{HashMap, HashSet};

use crate::text::closest_match;

use super::tokenizer::{tokenize, Token, TokenKind};

/// Keywords that are never column references.
const SQL_KEYWORDS: &[&str] = &[
    "select", "from", "where", "group", "order", "by", "having", "as", "and", "or", "not",
    "on", "join", "left", "right", "inner", "outer", "full", "cross", "case", "when", "then",
    "else", "end", "null", "is", "in", "like", "ilike", "between", "distinct", "limit",
    "offset", "union", "all", "intersect", "except", "filter", "over", "partition", "asc",
    "desc", "with", "exists", "any", "some", "cast", "interval", "true", "false", "using",
    "current_date", "current_timestamp", "current_time",
];

/// Function names and function-argument keywords that read like identifiers
/// but are not columns (`EXTRACT(EPOCH FROM ...)`, `DATE_PART('epoch', ...)`).
const SQL_FUNCTIONS: &[&str] = &[
    "count", "sum", "avg", "min", "max", "coalesce", "nullif", "extract", "date_part",
    "date_trunc", "epoch", "now", "round", "floor", "ceil", "abs", "lower", "upper",
    "length", "substr", "substring", "concat", "trim", "greatest", "least", "year", "month",
    "day", "hour", "minute", "second", "dow", "doy", "week", "quarter",
];

/// One invalid column reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRefError {
    /// The identifier as written.
    pub identifier: String,
    /// Table it resolved to, when qualified.
    pub table: Option<String>,
    /// Nearest valid column name, when one exists.
    pub suggestion: Option<String>,
    /// User-facing message.
    pub message: String,
}

fn is_keyword(word: &str) -> bool {
    SQL_KEYWORDS.contains(&word)
}

fn is_function(word: &str) -> bool {
    SQL_FUNCTIONS.contains(&word)
}

/// Extract `alias → table` bindings from `FROM`/`JOIN ... [AS] alias`
/// clauses. Table names map to themselves so qualified references via the
/// real name also resolve.
pub fn extract_table_aliases(tokens: &[Token]) -> HashMap<String, String> {
    let mut aliases = HashMap::new();

    let mut i = 0;
    while i < tokens.len() {
        let t = &tokens[i];
        if t.is_word("from") || t.is_word("join") {
            // Next word is the table (subqueries start with a paren; skip them).
            let Some(table_tok) = tokens.get(i + 1) else {
                break;
            };
            if table_tok.kind != TokenKind::Word && table_tok.kind != TokenKind::QuotedIdent {
                i += 1;
                continue;
            }
            let table = table_tok.lower();
            if is_keyword(&table) {
                i += 1;
                continue;
            }
            aliases.insert(table.clone(), table.clone());

            // Optional [AS] alias
            let mut j = i + 2;
            if tokens.get(j).map(|t| t.is_word("as")).unwrap_or(false) {
                j += 1;
            }
            if let Some(alias_tok) = tokens.get(j) {
                if (alias_tok.kind == TokenKind::Word || alias_tok.kind == TokenKind::QuotedIdent)
                    && !is_keyword(&alias_tok.lower())
                {
                    aliases.insert(alias_tok.lower(), table);
                    i = j + 1;
                    continue;
                }
            }
            i += 2;
            continue;
        }
        i += 1;
    }

    aliases
}

/// Validate every column reference in `sql` against `schema`
/// (lowercased table name → lowercased column names).
///
/// Returns one error per distinct unknown identifier. Keywords, known
/// function names and anything immediately followed by `(` are never
/// flagged.
pub fn validate_column_references(
    sql: &str,
    schema: &HashMap<String, Vec<String>>,
) -> Vec<ColumnRefError> {
    let tokens = tokenize(sql);
    let aliases = extract_table_aliases(&tokens);

    let all_columns: HashSet<&str> = schema
        .values()
        .flat_map(|cols| cols.iter().map(String::as_str))
        .collect();

    let mut errors: Vec<ColumnRefError> = Vec::new();
    let mut reported: HashSet<String> = HashSet::new();

    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Word && token.kind != TokenKind::QuotedIdent {
            continue;
        }
        let word = token.lower();

        if token.kind == TokenKind::Word && (is_keyword(&word) || is_function(&word)) {
            continue;
        }

        // Function call: identifier immediately followed by (
        if tokens.get(i + 1).map(|t| t.is_symbol('(')).unwrap_or(false) {
            continue;
        }

        // Table name or alias used as such
        if aliases.contains_key(&word) {
            continue;
        }

        // Qualifier position: word followed by '.' is resolved via the word
        // after the dot.
        if tokens.get(i + 1).map(|t| t.is_symbol('.')).unwrap_or(false) {
            continue;
        }

        // Output alias: SELECT ... AS name
        if i > 0 && tokens[i - 1].is_word("as") {
            continue;
        }

        // Qualified reference: qualifier '.' column
        let qualifier = if i >= 2 && tokens[i - 1].is_symbol('.') {
            match tokens[i - 2].kind {
                TokenKind::Word | TokenKind::QuotedIdent => Some(tokens[i - 2].lower()),
                _ => None,
            }
        } else {
            None
        };

        match qualifier {
            Some(qualifier) => {
                let Some(table) = aliases.get(&qualifier) else {
                    // Unknown qualifier; the identifier itself may still be
                    // fine, so only check it loosely against all columns.
                    if !all_columns.contains(word.as_str()) && reported.insert(word.clone()) {
                        errors.push(unknown_column(&word, None, &all_columns));
                    }
                    continue;
                };
                let empty = Vec::new();
                let table_columns = schema.get(table).unwrap_or(&empty);
                if !table_columns.iter().any(|c| c == &word) && reported.insert(word.clone()) {
                    let candidates: HashSet<&str> =
                        table_columns.iter().map(String::as_str).collect();
                    errors.push(unknown_column(&word, Some(table.clone()), &candidates));
                }
            }
            None => {
                if !all_columns.contains(word.as_str()) && reported.insert(word.clone()) {
                    errors.push(unknown_column(&word, None, &all_columns));
                }
            }
        }
    }

    errors
}

fn unknown_column(
    identifier: &str,
    table: Option<String>,
    candidates: &HashSet<&str>,
) -> ColumnRefError {
    // Only suggest names that are actually close; half the identifier's
    // length keeps "did you mean" from pointing at unrelated columns.
    let max_distance = (identifier.chars().count() / 2).max(2);
    let suggestion = closest_match(identifier, candidates.iter().copied())
        .filter(|(_, d)| *d <= max_distance)
        .map(|(best, _)| best.to_string());

    let location = match &table {
        Some(t) => format!(" in table '{}'", t),
        None => String::new(),
    };
    let message = match &suggestion {
        Some(s) => format!(
            "column '{}' does not exist{}; did you mean '{}'?",
            identifier, location, s
        ),
        None => format!("column '{}' does not exist{}", identifier, location),
    };

    ColumnRefError {
        identifier: identifier.to_string(),
        table,
        suggestion,
        message,
    }
}
