//! Prompt construction for glossary discovery and enrichment.
//!
//! Prompts embed the live schema: full column lists with types and key
//! markers, exact enum literals, warnings about commonly hallucinated
//! column names, and type-based comparison guidance. The enhanced variant
//! used on retry additionally carries the previous failure verbatim and
//! worked SQL patterns.

use std::fmt::Write as _;

use super::SchemaContext;

/// System message for all glossary LLM calls.
pub const SYSTEM_MESSAGE: &str = "You are a careful analytics engineer. You answer only with a \
single JSON object matching the requested schema, with no surrounding prose.";

/// Column names models invent when the schema spells them differently.
/// (hallucinated, actually present) pairs; a warning fires when the real
/// name exists and the invented one does not.
const CONFUSION_PAIRS: &[(&str, &str)] = &[
    ("started_at", "created_at"),
    ("start_date", "created_at"),
    ("finished_at", "completed_at"),
    ("end_date", "completed_at"),
    ("modified_at", "updated_at"),
];

/// Types compared without quotes in SQL.
const NUMERIC_TYPE_MARKERS: &[&str] = &[
    "int", "serial", "numeric", "decimal", "real", "double", "float", "money",
];

fn is_numeric_type(data_type: &str) -> bool {
    let ty = data_type.to_lowercase();
    NUMERIC_TYPE_MARKERS.iter().any(|marker| ty.contains(marker))
}

/// Render the table/column inventory block shared by all prompts.
fn schema_block(ctx: &SchemaContext) -> String {
    let mut out = String::new();

    let table_names: Vec<&str> = ctx.tables.iter().map(|t| t.name.as_str()).collect();
    let _ = writeln!(out, "Tables: {}", table_names.join(", "));
    let _ = writeln!(out);
    let _ = writeln!(out, "Columns:");
    for table in &ctx.tables {
        for column in &table.columns {
            let pk = if column.is_primary_key { " [PK]" } else { "" };
            let _ = writeln!(out, "- {}.{} ({}){}", table.name, column.name, column.data_type, pk);
        }
    }

    out
}

/// Render the exact allowed literals for every enum column.
fn enum_block(ctx: &SchemaContext) -> String {
    if ctx.enum_columns.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Enum columns and their EXACT allowed values (use them verbatim, never shortened):");
    let mut columns: Vec<_> = ctx.enum_columns.iter().collect();
    columns.sort_by_key(|(name, _)| name.as_str());
    for (column, values) in columns {
        let _ = writeln!(out, "- {}: {}", column, values.join(", "));
    }
    out
}

/// Warn against column names that look plausible but do not exist.
fn confusion_block(ctx: &SchemaContext) -> String {
    let mut present = std::collections::HashSet::new();
    for table in &ctx.tables {
        for column in &table.columns {
            present.insert(column.name.to_lowercase());
        }
    }

    let mut warnings = Vec::new();
    for (hallucinated, actual) in CONFUSION_PAIRS {
        if present.contains(*actual) && !present.contains(*hallucinated) {
            warnings.push(format!(
                "- The schema has '{}' but NO '{}'. Do not reference '{}'.",
                actual, hallucinated, hallucinated
            ));
        }
    }

    if warnings.is_empty() {
        return String::new();
    }
    format!("Common mistakes to avoid:\n{}\n", warnings.join("\n"))
}

/// Type-comparison guidance derived from actual schema types.
fn type_guidance_block(ctx: &SchemaContext) -> String {
    let mut numeric = Vec::new();
    let mut textual = Vec::new();
    for table in &ctx.tables {
        for column in &table.columns {
            let qualified = format!("{}.{}", table.name, column.name);
            if is_numeric_type(&column.data_type) {
                numeric.push(qualified);
            } else {
                textual.push(qualified);
            }
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "Comparison rules:");
    if !numeric.is_empty() {
        let _ = writeln!(
            out,
            "- Numeric columns, compare WITHOUT quotes: {}",
            numeric.join(", ")
        );
    }
    if !textual.is_empty() {
        let _ = writeln!(
            out,
            "- Text/date columns, compare WITH single quotes: {}",
            textual.join(", ")
        );
    }
    out
}

/// Prompt for the discovery phase: propose term names and definitions only.
pub fn build_discovery_prompt(ctx: &SchemaContext, existing_terms: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Propose business glossary terms (metrics a business user would ask about) \
         for the database below. Definitions only, no SQL."
    );
    let _ = writeln!(out);
    out.push_str(&schema_block(ctx));
    if !existing_terms.is_empty() {
        let _ = writeln!(out, "\nAlready defined (do not repeat): {}", existing_terms.join(", "));
    }
    let _ = writeln!(
        out,
        "\nRespond with JSON: {{\"terms\": [{{\"term\": \"...\", \"definition\": \"...\"}}]}}"
    );
    out
}

/// Prompt for the first enrichment attempt.
pub fn build_enrichment_prompt(term: &str, definition: &str, ctx: &SchemaContext) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Write a SQL query that computes the metric '{}' ({}).",
        term, definition
    );
    let _ = writeln!(
        out,
        "The query MUST return exactly one row. Reference only the columns listed below."
    );
    let _ = writeln!(out);
    out.push_str(&schema_block(ctx));
    let _ = writeln!(out);
    out.push_str(&enum_block(ctx));
    out.push_str(&confusion_block(ctx));
    out.push_str(&type_guidance_block(ctx));
    let _ = writeln!(
        out,
        "\nRespond with JSON: {{\"defining_sql\": \"...\", \"base_table\": \"...\", \"aliases\": [\"...\"]}}"
    );
    out
}

/// Prompt for the single retry: embeds the previous failure verbatim plus
/// worked patterns for the rate-style metrics models most often get wrong.
pub fn build_enhanced_prompt(
    term: &str,
    definition: &str,
    ctx: &SchemaContext,
    previous_error: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Your previous SQL for the metric '{}' ({}) was rejected.",
        term, definition
    );
    let _ = writeln!(out, "Validation error: {}", previous_error);
    let _ = writeln!(
        out,
        "\nFix the query. It MUST return exactly one row and reference only real columns."
    );
    let _ = writeln!(out);
    out.push_str(&schema_block(ctx));
    let _ = writeln!(out);
    out.push_str(&enum_block(ctx));
    out.push_str(&confusion_block(ctx));
    out.push_str(&type_guidance_block(ctx));

    let _ = writeln!(
        out,
        r#"
Worked patterns for rate-style metrics:

-- Utilization (used over capacity, divide-by-zero safe)
SELECT COALESCE(SUM(used_minutes), 0) * 1.0 / NULLIF(SUM(capacity_minutes), 0) AS utilization
FROM bookings;

-- Participation rate (conditional count over total)
SELECT COUNT(*) FILTER (WHERE attended) * 1.0 / NULLIF(COUNT(*), 0) AS participation_rate
FROM registrations;

-- Completion rate across two tables
SELECT COUNT(c.id) * 1.0 / NULLIF(COUNT(t.id), 0) AS completion_rate
FROM tasks t
LEFT JOIN completions c ON c.task_id = t.id;"#
    );

    let _ = writeln!(
        out,
        "\nRespond with JSON: {{\"defining_sql\": \"...\", \"base_table\": \"...\", \"aliases\": [\"...\"]}}"
    );
    out
}
