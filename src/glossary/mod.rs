//! Business glossary service: LLM-driven term discovery and SQL enrichment
//! with validation against the live schema.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::datasource::QueryExecutor;
use crate::error::{OntomapError, Result};
use crate::llm::{parse_json_response, GenerateRequest, LlmClient};
use crate::model::{BusinessGlossaryTerm, TermSource};
use crate::repo::{ColumnMetadataRepository, GlossaryRepository, SchemaRepository};

pub mod columns;
pub mod enums;
pub mod prompt;
pub mod tokenizer;
pub mod validate;

pub use columns::{validate_column_references, ColumnRefError};
pub use enums::{check_enum_literals, EnumMismatch};
pub use validate::{test_sql, validate_defining_sql, TestSqlResult};

/// One column as the prompt builder and validators see it.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_primary_key: bool,
}

/// One table with its columns.
#[derive(Debug, Clone)]
pub struct TableColumns {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Schema snapshot shared by prompt construction and SQL validation.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    pub tables: Vec<TableColumns>,
    /// Enum column name → exact allowed literals.
    pub enum_columns: HashMap<String, Vec<String>>,
    /// Lowercased table name → lowercased column names, for reference checks.
    pub schema_columns: HashMap<String, Vec<String>>,
}

/// LLM response schema for discovery.
#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    terms: Vec<DiscoveredTerm>,
}

#[derive(Debug, Deserialize)]
struct DiscoveredTerm {
    term: String,
    definition: String,
}

/// LLM response schema for enrichment.
#[derive(Debug, Deserialize)]
struct EnrichmentResponse {
    defining_sql: String,
    #[serde(default)]
    base_table: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Counts from one enrichment pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    pub enriched: usize,
    pub skipped: usize,
}

/// Discovery and enrichment over one datasource's glossary.
pub struct GlossaryService {
    glossary: Arc<dyn GlossaryRepository>,
    schema: Arc<dyn SchemaRepository>,
    metadata: Arc<dyn ColumnMetadataRepository>,
    llm: Arc<dyn LlmClient>,
    executor: Arc<dyn QueryExecutor>,
    temperature: f32,
}

impl GlossaryService {
    pub fn new(
        glossary: Arc<dyn GlossaryRepository>,
        schema: Arc<dyn SchemaRepository>,
        metadata: Arc<dyn ColumnMetadataRepository>,
        llm: Arc<dyn LlmClient>,
        executor: Arc<dyn QueryExecutor>,
        temperature: f32,
    ) -> Self {
        Self {
            glossary,
            schema,
            metadata,
            llm,
            executor,
            temperature,
        }
    }

    /// Snapshot the datasource schema for prompts and validation.
    pub async fn build_schema_context(&self, datasource_id: &str) -> Result<SchemaContext> {
        let tables = self.schema.list_tables_by_datasource(datasource_id).await?;
        let columns = self.schema.list_columns_by_datasource(datasource_id).await?;

        let column_ids: Vec<String> = columns.iter().map(|c| c.id.clone()).collect();
        let metadata = self.metadata.get_by_columns(&column_ids).await?;
        let names_by_id: HashMap<&str, &str> = columns
            .iter()
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();

        let mut enum_columns = HashMap::new();
        for entry in &metadata {
            if entry.enum_values.is_empty() {
                continue;
            }
            if let Some(name) = names_by_id.get(entry.column_id.as_str()) {
                enum_columns.insert(name.to_lowercase(), entry.enum_values.clone());
            }
        }

        let mut context_tables = Vec::with_capacity(tables.len());
        let mut schema_columns: HashMap<String, Vec<String>> = HashMap::new();
        for table in &tables {
            let table_columns: Vec<&crate::model::SchemaColumn> = columns
                .iter()
                .filter(|c| c.table_id == table.id)
                .collect();
            schema_columns.insert(
                table.name.to_lowercase(),
                table_columns.iter().map(|c| c.name.to_lowercase()).collect(),
            );
            context_tables.push(TableColumns {
                name: table.name.clone(),
                columns: table_columns
                    .iter()
                    .map(|c| ColumnInfo {
                        name: c.name.clone(),
                        data_type: c.data_type.clone(),
                        is_primary_key: c.is_primary_key,
                    })
                    .collect(),
            });
        }

        Ok(SchemaContext {
            tables: context_tables,
            enum_columns,
            schema_columns,
        })
    }

    /// Discovery phase: ask the LLM for term names and definitions, dedupe
    /// by exact (case-insensitive) name, create what's new. Returns the
    /// created terms.
    pub async fn discover_terms(&self, datasource_id: &str) -> Result<Vec<BusinessGlossaryTerm>> {
        let context = self.build_schema_context(datasource_id).await?;
        let existing = self.glossary.list_terms(datasource_id).await?;
        let existing_names: HashSet<String> =
            existing.iter().map(|t| t.term.to_lowercase()).collect();

        let prompt = prompt::build_discovery_prompt(
            &context,
            &existing.iter().map(|t| t.term.clone()).collect::<Vec<_>>(),
        );
        let response = self
            .llm
            .generate_response(&GenerateRequest {
                prompt,
                system_message: prompt::SYSTEM_MESSAGE.to_string(),
                temperature: self.temperature,
                thinking: false,
            })
            .await?;
        let parsed: DiscoveryResponse = parse_json_response(&response.content)?;

        let mut created = Vec::new();
        for discovered in parsed.terms {
            let name = discovered.term.trim();
            if name.is_empty() || existing_names.contains(&name.to_lowercase()) {
                log::debug!("skipping duplicate or empty term '{}'", discovered.term);
                continue;
            }

            let term = BusinessGlossaryTerm {
                id: Uuid::new_v4().to_string(),
                datasource_id: datasource_id.to_string(),
                term: name.to_string(),
                definition: discovered.definition,
                defining_sql: None,
                base_table: None,
                aliases: Vec::new(),
                source: TermSource::Inferred,
                created_at: Utc::now(),
            };

            // One failed insert must not abort the rest of the batch.
            match self.glossary.create(&term).await {
                Ok(()) => created.push(term),
                Err(e) => log::warn!("failed to create term '{}': {}", name, e),
            }
        }

        log::info!("discovery created {} new terms", created.len());
        Ok(created)
    }

    /// Enrichment phase: best-effort per term, one retry with repair
    /// context, failures leave the term unenriched.
    pub async fn enrich_terms(&self, datasource_id: &str) -> Result<EnrichmentOutcome> {
        let context = self.build_schema_context(datasource_id).await?;
        let backlog = self.glossary.list_unenriched(datasource_id).await?;
        log::info!("enriching {} terms", backlog.len());

        let mut outcome = EnrichmentOutcome::default();
        for term in backlog {
            match self.enrich_term(&term, &context).await {
                Some(enrichment) => {
                    let mut updated = term;
                    updated.defining_sql = Some(enrichment.defining_sql);
                    updated.base_table = enrichment.base_table;
                    updated.aliases = enrichment.aliases;
                    self.glossary.update(&updated).await?;
                    outcome.enriched += 1;
                }
                None => outcome.skipped += 1,
            }
        }

        Ok(outcome)
    }

    /// Generate-validate loop for one term: standard prompt, then exactly
    /// one retry with the failure embedded. `None` means both attempts
    /// failed and the term stays unenriched.
    async fn enrich_term(
        &self,
        term: &BusinessGlossaryTerm,
        context: &SchemaContext,
    ) -> Option<EnrichmentResponse> {
        let mut last_error = String::new();

        for attempt in 0..2 {
            let prompt_text = if attempt == 0 {
                prompt::build_enrichment_prompt(&term.term, &term.definition, context)
            } else {
                prompt::build_enhanced_prompt(&term.term, &term.definition, context, &last_error)
            };

            let response = match self
                .llm
                .generate_response(&GenerateRequest {
                    prompt: prompt_text,
                    system_message: prompt::SYSTEM_MESSAGE.to_string(),
                    temperature: self.temperature,
                    thinking: attempt > 0,
                })
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            let parsed: EnrichmentResponse = match parse_json_response(&response.content) {
                Ok(parsed) => parsed,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            match validate_defining_sql(
                &term.term,
                &parsed.defining_sql,
                &context.schema_columns,
                &context.enum_columns,
                self.executor.as_ref(),
            )
            .await
            {
                Ok(()) => return Some(parsed),
                Err(message) => {
                    log::debug!(
                        "attempt {} for '{}' rejected: {}",
                        attempt + 1,
                        term.term,
                        message
                    );
                    last_error = message;
                }
            }
        }

        log::warn!("enrichment failed for '{}': {}", term.term, last_error);
        None
    }

    /// Create a manually curated term. Manual terms carry SQL from the
    /// start, validated the same way as enriched SQL, and never enter the
    /// enrichment backlog.
    pub async fn create_manual_term(
        &self,
        datasource_id: &str,
        term: &str,
        definition: &str,
        defining_sql: &str,
        base_table: Option<String>,
        aliases: Vec<String>,
    ) -> Result<BusinessGlossaryTerm> {
        let context = self.build_schema_context(datasource_id).await?;

        validate_defining_sql(
            term,
            defining_sql,
            &context.schema_columns,
            &context.enum_columns,
            self.executor.as_ref(),
        )
        .await
        .map_err(|message| {
            OntomapError::InvalidInput(format!("defining SQL rejected: {}", message))
        })?;

        let record = BusinessGlossaryTerm {
            id: Uuid::new_v4().to_string(),
            datasource_id: datasource_id.to_string(),
            term: term.to_string(),
            definition: definition.to_string(),
            defining_sql: Some(defining_sql.to_string()),
            base_table,
            aliases,
            source: TermSource::Manual,
            created_at: Utc::now(),
        };
        self.glossary.create(&record).await?;
        Ok(record)
    }

    /// Test-execute SQL against the datasource; structured result, never an
    /// error for invalid SQL.
    pub async fn test_term_sql(&self, sql: &str) -> TestSqlResult {
        test_sql(self.executor.as_ref(), sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::SqliteDatasource;
    use crate::db::{migrate, Db};
    use crate::error::OntomapError;
    use crate::llm::LlmResponse;
    use crate::model::{ColumnMetadata, ColumnPurpose, Datasource, SchemaColumn, SchemaTable};
    use crate::repo::{
        GlossaryRepository, SqliteColumnMetadataRepository, SqliteGlossaryRepository,
        SqliteSchemaRepository,
    };
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// LLM stub returning scripted responses and recording prompts.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate_response(&self, request: &GenerateRequest) -> Result<LlmResponse> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let content = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| OntomapError::Llm("no scripted response left".to_string()))?;
            Ok(LlmResponse {
                content,
                prompt_tokens: 10,
                completion_tokens: 10,
            })
        }
    }

    struct Fixture {
        service: GlossaryService,
        glossary: Arc<SqliteGlossaryRepository>,
        llm: Arc<ScriptedLlm>,
        datasource_id: String,
        _tmp: TempDir,
    }

    async fn setup(responses: &[&str]) -> Fixture {
        let tmp = TempDir::new().unwrap();

        // Ontology store with schema + metadata
        let db = Arc::new(Db::new(tmp.path().join("store.db")));
        db.with_connection(|conn| migrate::run_migrations(conn))
            .await
            .unwrap();
        let schema = Arc::new(SqliteSchemaRepository::new(db.clone()));
        let metadata = Arc::new(SqliteColumnMetadataRepository::new(db.clone()));
        let glossary = Arc::new(SqliteGlossaryRepository::new(db.clone()));

        let ds = schema
            .ensure_datasource(&Datasource {
                id: "ds1".to_string(),
                name: "test".to_string(),
                kind: "sqlite".to_string(),
                location: "unused".to_string(),
            })
            .await
            .unwrap();

        schema
            .upsert_table(&SchemaTable {
                id: "t-users".to_string(),
                datasource_id: ds.id.clone(),
                name: "users".to_string(),
                row_count: Some(2),
                deleted_at: None,
            })
            .await
            .unwrap();
        for (name, data_type, pk) in [
            ("id", "integer", true),
            ("email", "text", false),
            ("created_at", "timestamp", false),
            ("plan", "text", false),
        ] {
            schema
                .upsert_column(&SchemaColumn {
                    id: format!("t-users-{}", name),
                    table_id: "t-users".to_string(),
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                    is_nullable: !pk,
                    is_primary_key: pk,
                    is_unique: pk,
                })
                .await
                .unwrap();
        }
        metadata
            .upsert(&ColumnMetadata {
                column_id: "t-users-plan".to_string(),
                purpose: Some(ColumnPurpose::Enum),
                semantic_type: None,
                enum_values: vec!["PLAN_FREE".to_string(), "PLAN_PRO".to_string()],
            })
            .await
            .unwrap();

        // Customer database for test execution
        let customer_path = tmp.path().join("customer.db");
        let conn = Connection::open(&customer_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, created_at TEXT, plan TEXT);
             INSERT INTO users VALUES
                (1, 'a@example.com', '2026-01-01', 'PLAN_PRO'),
                (2, 'b@example.com', '2026-01-02', 'PLAN_FREE');",
        )
        .unwrap();
        drop(conn);

        let llm = ScriptedLlm::new(responses);
        let service = GlossaryService::new(
            glossary.clone(),
            schema,
            metadata,
            llm.clone(),
            Arc::new(SqliteDatasource::new(customer_path)),
            0.2,
        );

        Fixture {
            service,
            glossary,
            llm,
            datasource_id: ds.id,
            _tmp: tmp,
        }
    }

    async fn seed_unenriched(fixture: &Fixture, term: &str, definition: &str) {
        fixture
            .glossary
            .create(&BusinessGlossaryTerm {
                id: Uuid::new_v4().to_string(),
                datasource_id: fixture.datasource_id.clone(),
                term: term.to_string(),
                definition: definition.to_string(),
                defining_sql: None,
                base_table: None,
                aliases: Vec::new(),
                source: TermSource::Inferred,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_enrichment_succeeds_first_attempt() {
        let fixture = setup(&[
            r#"{"defining_sql": "SELECT COUNT(*) AS total FROM users", "base_table": "users", "aliases": ["user count"]}"#,
        ])
        .await;
        seed_unenriched(&fixture, "Total Users", "how many users exist").await;

        let outcome = fixture
            .service
            .enrich_terms(&fixture.datasource_id)
            .await
            .unwrap();
        assert_eq!(outcome, EnrichmentOutcome { enriched: 1, skipped: 0 });

        let terms = fixture
            .glossary
            .list_terms(&fixture.datasource_id)
            .await
            .unwrap();
        assert_eq!(
            terms[0].defining_sql.as_deref(),
            Some("SELECT COUNT(*) AS total FROM users")
        );
        assert_eq!(terms[0].base_table.as_deref(), Some("users"));
        assert_eq!(terms[0].aliases, vec!["user count"]);
        assert_eq!(fixture.llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_enrichment_retries_with_error_context() {
        let fixture = setup(&[
            // First attempt hallucinates started_at
            r#"{"defining_sql": "SELECT COUNT(*) FROM users WHERE started_at IS NOT NULL"}"#,
            // Second attempt is valid
            r#"{"defining_sql": "SELECT COUNT(*) AS total FROM users WHERE created_at IS NOT NULL"}"#,
        ])
        .await;
        seed_unenriched(&fixture, "Active Users", "users with a creation date").await;

        let outcome = fixture
            .service
            .enrich_terms(&fixture.datasource_id)
            .await
            .unwrap();
        assert_eq!(outcome, EnrichmentOutcome { enriched: 1, skipped: 0 });

        let prompts = fixture.llm.prompts();
        assert_eq!(prompts.len(), 2);
        // The retry embeds the literal failure and the worked patterns
        assert!(prompts[1].contains("started_at"));
        assert!(prompts[1].contains("did you mean 'created_at'"));
        assert!(prompts[1].contains("NULLIF"));
    }

    #[tokio::test]
    async fn test_enrichment_gives_up_after_second_failure() {
        let fixture = setup(&[
            r#"{"defining_sql": "SELECT id FROM users"}"#,
            r#"{"defining_sql": "SELECT email FROM users"}"#,
        ])
        .await;
        seed_unenriched(&fixture, "Total Users", "how many users exist").await;

        let outcome = fixture
            .service
            .enrich_terms(&fixture.datasource_id)
            .await
            .unwrap();
        assert_eq!(outcome, EnrichmentOutcome { enriched: 0, skipped: 1 });

        // Term left unenriched, no error surfaced
        let backlog = fixture
            .glossary
            .list_unenriched(&fixture.datasource_id)
            .await
            .unwrap();
        assert_eq!(backlog.len(), 1);
    }

    #[tokio::test]
    async fn test_enrichment_rejects_enum_shorthand_then_repairs() {
        let fixture = setup(&[
            r#"{"defining_sql": "SELECT COUNT(*) FROM users WHERE plan = 'pro'"}"#,
            r#"{"defining_sql": "SELECT COUNT(*) FROM users WHERE plan = 'PLAN_PRO'"}"#,
        ])
        .await;
        seed_unenriched(&fixture, "Pro Users", "users on the pro plan").await;

        let outcome = fixture
            .service
            .enrich_terms(&fixture.datasource_id)
            .await
            .unwrap();
        assert_eq!(outcome.enriched, 1);

        let prompts = fixture.llm.prompts();
        assert!(prompts[1].contains("PLAN_PRO"));
    }

    #[tokio::test]
    async fn test_one_term_failure_does_not_abort_batch() {
        let fixture = setup(&[
            // Term 1: two bad attempts
            r#"{"defining_sql": "SELECT id FROM users"}"#,
            r#"{"defining_sql": "SELECT id FROM users"}"#,
            // Term 2: valid
            r#"{"defining_sql": "SELECT COUNT(*) AS total FROM users"}"#,
        ])
        .await;
        seed_unenriched(&fixture, "A Broken Metric", "never validates").await;
        seed_unenriched(&fixture, "Total Users", "how many users exist").await;

        let outcome = fixture
            .service
            .enrich_terms(&fixture.datasource_id)
            .await
            .unwrap();
        assert_eq!(outcome, EnrichmentOutcome { enriched: 1, skipped: 1 });
    }

    #[tokio::test]
    async fn test_discovery_dedupes_existing_terms() {
        let fixture = setup(&[
            r#"{"terms": [
                {"term": "total users", "definition": "how many users"},
                {"term": "New Signups", "definition": "users created this month"}
            ]}"#,
        ])
        .await;
        // Existing term differs only in case
        seed_unenriched(&fixture, "Total Users", "how many users exist").await;

        let created = fixture
            .service
            .discover_terms(&fixture.datasource_id)
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].term, "New Signups");
        assert_eq!(created[0].source, TermSource::Inferred);
        assert!(created[0].defining_sql.is_none());
    }

    #[tokio::test]
    async fn test_manual_term_validated_at_creation() {
        let fixture = setup(&[]).await;

        let err = fixture
            .service
            .create_manual_term(
                &fixture.datasource_id,
                "All User Rows",
                "one row per user",
                "SELECT id FROM users",
                None,
                Vec::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("multiple rows"));

        let created = fixture
            .service
            .create_manual_term(
                &fixture.datasource_id,
                "Total Users",
                "how many users exist",
                "SELECT COUNT(*) AS total FROM users",
                Some("users".to_string()),
                vec!["user count".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(created.source, TermSource::Manual);

        // Manual terms never enter the enrichment backlog
        let backlog = fixture
            .glossary
            .list_unenriched(&fixture.datasource_id)
            .await
            .unwrap();
        assert!(backlog.is_empty());
    }

    #[tokio::test]
    async fn test_test_term_sql_structured_result() {
        let fixture = setup(&[]).await;

        let good = fixture
            .service
            .test_term_sql("SELECT COUNT(*) AS total FROM users")
            .await;
        assert!(good.valid);

        let bad = fixture.service.test_term_sql("SELECT 1 UNION ALL SELECT 2").await;
        assert!(!bad.valid);
        assert!(bad.error.unwrap().contains("multiple rows"));
    }

    #[tokio::test]
    async fn test_schema_context_includes_enums() {
        let fixture = setup(&[]).await;
        let context = fixture
            .service
            .build_schema_context(&fixture.datasource_id)
            .await
            .unwrap();

        assert_eq!(context.tables.len(), 1);
        assert_eq!(context.tables[0].name, "users");
        assert_eq!(
            context.enum_columns.get("plan").unwrap(),
            &vec!["PLAN_FREE".to_string(), "PLAN_PRO".to_string()]
        );
        assert_eq!(context.schema_columns.get("users").unwrap().len(), 4);
    }
}
