use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use ontomap::cache::ResponseCache;
use ontomap::config::Config;
use ontomap::datasource::{
    DatasourceConfig, DefaultDiscovererFactory, SchemaDiscoverer, SqliteDatasource,
};
use ontomap::db::{migrate, Db};
use ontomap::glossary::GlossaryService;
use ontomap::inference::{NameInferenceTask, ValueMatchTask};
use ontomap::llm::OpenAiClient;
use ontomap::model::{Datasource, SchemaColumn, SchemaTable};
use ontomap::profile::ColumnScanTask;
use ontomap::repo::{
    GlossaryRepository, SqliteColumnMetadataRepository, SqliteGlossaryRepository,
    SqliteRelationshipCandidateRepository, SqliteSchemaRepository, SqliteWorkflowStateRepository,
};
use ontomap::workflow::{seed_column_states, SingleTenantContext, Task, TaskContext};

#[derive(Parser, Debug)]
#[command(name = "ontomap")]
#[command(about = "Incremental semantic ontology builder for relational databases")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a datasource and sync its schema into the ontology store
    Sync {
        /// Datasource name
        #[arg(short, long)]
        datasource: String,
        /// Path to the SQLite database file
        #[arg(short, long)]
        path: String,
    },
    /// Profile every column of a datasource (seeds a new workflow)
    Scan {
        #[arg(short, long)]
        datasource: String,
        /// Workflow to continue; a new one is created when omitted
        #[arg(short, long)]
        workflow: Option<String>,
    },
    /// Classify columns as entity-reference candidates, with reasons
    Filter {
        #[arg(short, long)]
        datasource: String,
        /// Workflow whose scanned statistics to use
        #[arg(short, long)]
        workflow: String,
    },
    /// Infer relationship candidates from names and sampled values
    Infer {
        #[arg(short, long)]
        datasource: String,
        #[arg(short, long)]
        workflow: String,
    },
    /// Discover and enrich business glossary terms (requires LLM access)
    Enrich {
        #[arg(short, long)]
        datasource: String,
    },
    /// List relationship candidates of a workflow
    Candidates {
        #[arg(short, long)]
        datasource: String,
        #[arg(short, long)]
        workflow: String,
    },
    /// List glossary terms of a datasource
    Terms {
        #[arg(short, long)]
        datasource: String,
    },
}

struct App {
    db: Arc<Db>,
    schema: Arc<SqliteSchemaRepository>,
    config: Config,
}

impl App {
    async fn open(config: Config) -> Result<Self> {
        let db = Arc::new(Db::new(config.db_path()));
        db.with_connection(|conn| migrate::run_migrations(conn))
            .await
            .context("running store migrations")?;
        let schema = Arc::new(SqliteSchemaRepository::new(db.clone()));
        Ok(Self { db, schema, config })
    }

    fn task_context(&self) -> TaskContext {
        TaskContext {
            tenant: Arc::new(SingleTenantContext),
            schema: self.schema.clone(),
            states: Arc::new(SqliteWorkflowStateRepository::new(self.db.clone())),
            candidates: Arc::new(SqliteRelationshipCandidateRepository::new(self.db.clone())),
            metadata: Arc::new(SqliteColumnMetadataRepository::new(self.db.clone())),
            discoverers: Arc::new(DefaultDiscovererFactory),
            profiling: self.config.profiling.clone(),
            filtering: self.config.filtering.clone(),
            matching: self.config.matching.clone(),
        }
    }

    async fn require_datasource(&self, name: &str) -> Result<Datasource> {
        self.schema
            .get_datasource(name)
            .await?
            .with_context(|| format!("datasource '{}' is not registered; run sync first", name))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let app = App::open(config).await?;

    match args.command {
        Command::Sync { datasource, path } => run_sync(&app, &datasource, &path).await,
        Command::Scan {
            datasource,
            workflow,
        } => run_scan(&app, &datasource, workflow).await,
        Command::Filter {
            datasource,
            workflow,
        } => run_filter(&app, &datasource, &workflow).await,
        Command::Infer {
            datasource,
            workflow,
        } => run_infer(&app, &datasource, &workflow).await,
        Command::Enrich { datasource } => run_enrich(&app, &datasource).await,
        Command::Candidates {
            datasource,
            workflow,
        } => run_candidates(&app, &datasource, &workflow).await,
        Command::Terms { datasource } => run_terms(&app, &datasource).await,
    }
}

/// Register the datasource and mirror its structural schema into the store.
async fn run_sync(app: &App, name: &str, path: &str) -> Result<()> {
    let ds = app
        .schema
        .ensure_datasource(&Datasource {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            kind: "sqlite".to_string(),
            location: path.to_string(),
        })
        .await?;

    let adapter = SqliteDatasource::new(&ds.location);
    let discovered = adapter.discover_schema().await?;

    let mut table_count = 0;
    let mut column_count = 0;
    for table in discovered {
        let table_id = app
            .schema
            .upsert_table(&SchemaTable {
                id: Uuid::new_v4().to_string(),
                datasource_id: ds.id.clone(),
                name: table.name.clone(),
                row_count: None,
                deleted_at: None,
            })
            .await?;
        table_count += 1;

        for column in table.columns {
            app.schema
                .upsert_column(&SchemaColumn {
                    id: Uuid::new_v4().to_string(),
                    table_id: table_id.clone(),
                    name: column.name,
                    data_type: column.data_type,
                    is_nullable: column.is_nullable,
                    is_primary_key: column.is_primary_key,
                    is_unique: column.is_primary_key,
                })
                .await?;
            column_count += 1;
        }
    }

    log::info!(
        "synced datasource '{}': {} tables, {} columns",
        name,
        table_count,
        column_count
    );
    Ok(())
}

/// Seed workflow state and scan every column of the datasource.
async fn run_scan(app: &App, name: &str, workflow: Option<String>) -> Result<()> {
    let ds = app.require_datasource(name).await?;
    let ctx = app.task_context();

    let workflow_id = workflow.unwrap_or_else(|| Uuid::new_v4().to_string());
    let tables = ctx.schema.list_tables_by_datasource(&ds.id).await?;
    let columns = ctx.schema.list_columns_by_datasource(&ds.id).await?;

    let seeded = seed_column_states(ctx.states.as_ref(), &workflow_id, &tables, &columns).await?;
    log::info!("workflow {}: seeded {} column states", workflow_id, seeded);

    let table_names: HashMap<&str, &str> = tables
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .collect();
    let datasource_config = DatasourceConfig {
        kind: ds.kind.clone(),
        location: ds.location.clone(),
    };

    let mut scanned = 0;
    let mut failed = 0;
    for column in &columns {
        let Some(table_name) = table_names.get(column.table_id.as_str()) else {
            continue;
        };
        let task = ColumnScanTask {
            workflow_id: workflow_id.clone(),
            project_id: name.to_string(),
            datasource: datasource_config.clone(),
            table_name: table_name.to_string(),
            column_name: column.name.clone(),
        };
        match task.execute(&ctx).await {
            Ok(()) => scanned += 1,
            Err(e) => {
                log::error!("scan failed for {}.{}: {}", table_name, column.name, e);
                failed += 1;
            }
        }
    }

    log::info!(
        "workflow {}: scanned {} columns ({} failed)",
        workflow_id,
        scanned,
        failed
    );
    println!("{}", workflow_id);
    Ok(())
}

/// Classify columns as entity candidates using scanned statistics and
/// stored metadata, and print every classification with its reason.
async fn run_filter(app: &App, name: &str, workflow_id: &str) -> Result<()> {
    let ds = app.require_datasource(name).await?;
    let ctx = app.task_context();

    let tables = ctx.schema.list_tables_by_datasource(&ds.id).await?;
    let columns = ctx.schema.list_columns_by_datasource(&ds.id).await?;

    let tables_by_id: HashMap<String, ontomap::model::SchemaTable> =
        tables.iter().map(|t| (t.id.clone(), t.clone())).collect();
    let table_names: HashMap<&str, &str> = tables
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .collect();

    // Statistics come from the workflow's scanned profiles.
    let mut stats = HashMap::new();
    for column in &columns {
        let Some(table_name) = table_names.get(column.table_id.as_str()) else {
            continue;
        };
        let entity_key = format!("{}.{}", table_name, column.name);
        if let Some(state) = ctx
            .states
            .get_by_entity(workflow_id, ontomap::model::EntityType::Column, &entity_key)
            .await?
        {
            if let Some(profile) = state.state_data.gathered {
                stats.insert(
                    entity_key,
                    ontomap::model::ColumnStats {
                        row_count: profile.row_count,
                        non_null_count: profile.non_null_count,
                        distinct_count: profile.distinct_count,
                    },
                );
            }
        }
    }

    let column_ids: Vec<String> = columns.iter().map(|c| c.id.clone()).collect();
    let metadata: HashMap<String, ontomap::model::ColumnMetadata> = ctx
        .metadata
        .get_by_columns(&column_ids)
        .await?
        .into_iter()
        .map(|m| (m.column_id.clone(), m))
        .collect();
    let metadata = if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    };

    let outcome = ontomap::inference::filter_entity_candidates(
        &columns,
        &tables_by_id,
        &stats,
        metadata.as_ref(),
        &app.config.filtering,
    );

    println!("candidates:");
    for entry in &outcome.candidates {
        let table = table_names
            .get(entry.column.table_id.as_str())
            .copied()
            .unwrap_or("?");
        println!("  {}.{}: {}", table, entry.column.name, entry.reason);
    }
    println!("excluded:");
    for entry in &outcome.excluded {
        let table = table_names
            .get(entry.column.table_id.as_str())
            .copied()
            .unwrap_or("?");
        println!("  {}.{}: {}", table, entry.column.name, entry.reason);
    }
    Ok(())
}

/// Run both inference tasks over a scanned workflow.
async fn run_infer(app: &App, name: &str, workflow_id: &str) -> Result<()> {
    let ds = app.require_datasource(name).await?;
    let ctx = app.task_context();

    let name_task = NameInferenceTask {
        workflow_id: workflow_id.to_string(),
        project_id: name.to_string(),
        datasource_id: ds.id.clone(),
    };
    name_task.execute(&ctx).await?;

    let value_task = ValueMatchTask {
        workflow_id: workflow_id.to_string(),
        project_id: name.to_string(),
        datasource_id: ds.id,
    };
    value_task.execute(&ctx).await?;

    let candidates = ctx.candidates.get_by_workflow(workflow_id).await?;
    log::info!(
        "workflow {}: {} relationship candidates",
        workflow_id,
        candidates.len()
    );
    Ok(())
}

/// Glossary discovery and enrichment against the configured LLM.
async fn run_enrich(app: &App, name: &str) -> Result<()> {
    let ds = app.require_datasource(name).await?;

    let api_key = std::env::var(&app.config.llm.api_key_env).with_context(|| {
        format!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            app.config.llm.api_key_env
        )
    })?;

    let cache = if app.config.llm.cache_capacity > 0 {
        Some(Arc::new(ResponseCache::new(app.config.llm.cache_capacity)))
    } else {
        None
    };
    let llm = Arc::new(OpenAiClient::new_with_cache(
        api_key,
        app.config.llm.model.clone(),
        app.config.llm.max_retries,
        cache,
    ));

    let service = GlossaryService::new(
        Arc::new(SqliteGlossaryRepository::new(app.db.clone())),
        app.schema.clone(),
        Arc::new(SqliteColumnMetadataRepository::new(app.db.clone())),
        llm,
        Arc::new(SqliteDatasource::new(&ds.location)),
        app.config.llm.temperature,
    );

    let discovered = service.discover_terms(&ds.id).await?;
    log::info!("discovered {} new terms", discovered.len());

    let outcome = service.enrich_terms(&ds.id).await?;
    log::info!(
        "enriched {} terms, {} left unenriched",
        outcome.enriched,
        outcome.skipped
    );
    Ok(())
}

/// Print relationship candidates with resolved column names.
async fn run_candidates(app: &App, name: &str, workflow_id: &str) -> Result<()> {
    let ds = app.require_datasource(name).await?;
    let ctx = app.task_context();

    let tables = ctx.schema.list_tables_by_datasource(&ds.id).await?;
    let columns = ctx.schema.list_columns_by_datasource(&ds.id).await?;
    let table_names: HashMap<&str, &str> = tables
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .collect();
    let qualified: HashMap<&str, String> = columns
        .iter()
        .map(|c| {
            let table = table_names.get(c.table_id.as_str()).copied().unwrap_or("?");
            (c.id.as_str(), format!("{}.{}", table, c.name))
        })
        .collect();

    let candidates = ctx.candidates.get_by_workflow(workflow_id).await?;
    if candidates.is_empty() {
        println!("no candidates for workflow {}", workflow_id);
        return Ok(());
    }

    for candidate in candidates {
        let source = qualified
            .get(candidate.source_column_id.as_str())
            .cloned()
            .unwrap_or_else(|| candidate.source_column_id.clone());
        let target = qualified
            .get(candidate.target_column_id.as_str())
            .cloned()
            .unwrap_or_else(|| candidate.target_column_id.clone());
        let score = match candidate.detection_method {
            ontomap::DetectionMethod::NameInference => {
                format!("confidence {:.2}", candidate.confidence.unwrap_or(0.0))
            }
            ontomap::DetectionMethod::ValueMatch => {
                format!(
                    "match rate {:.0}%",
                    candidate.value_match_rate.unwrap_or(0.0) * 100.0
                )
            }
        };
        println!(
            "{} -> {} [{}] {} ({})",
            source,
            target,
            candidate.detection_method.as_str(),
            score,
            candidate.status.as_str()
        );
    }
    Ok(())
}

/// Print glossary terms and their enrichment state.
async fn run_terms(app: &App, name: &str) -> Result<()> {
    let ds = app.require_datasource(name).await?;
    let glossary = SqliteGlossaryRepository::new(app.db.clone());

    let terms = glossary.list_terms(&ds.id).await?;
    if terms.is_empty() {
        println!("no glossary terms for datasource {}", name);
        return Ok(());
    }

    for term in terms {
        let state = if term.defining_sql.as_deref().unwrap_or("").is_empty() {
            "unenriched"
        } else {
            "enriched"
        };
        println!("{} [{}] ({}): {}", term.term, state, term.source.as_str(), term.definition);
        if let Some(sql) = &term.defining_sql {
            if !sql.is_empty() {
                println!("    {}", sql);
            }
        }
    }
    Ok(())
}
