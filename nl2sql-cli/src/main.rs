//! `nl2sql` — the external-collaborator surface named in spec §6: an
//! interactive driver for `Agent::ask` plus the embedding pipeline's
//! named steps. Chat-UI and stdio-protocol wrappers live outside this
//! repository and call the same `nl2sql-agent::Agent::ask` entry point.

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nl2sql_agent::Agent;
use nl2sql_core::{AgentConfig, ChatProvider, EmbeddingProvider, Nl2SqlError, Nl2SqlResult};
use nl2sql_embedding::{EmbeddingPipeline, Step};
use nl2sql_llm::{OpenAiCompatChatProvider, VertexEmbeddingProvider};
use nl2sql_retrieval::{RetrievalEngine, SearchConfig};
use nl2sql_sql::SqlPipeline;
use nl2sql_warehouse::BigQueryWarehouse;

use cli::{AskArgs, Cli, Commands, EmbedArgs, GlobalArgs};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = run(cli).await;

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Nl2SqlResult<()> {
    let config = AgentConfig::from_env()?;
    let catalog = Arc::new(nl2sql_catalog::load_catalog(Path::new(&cli.global.catalog_root))?);
    let warehouse = Arc::new(bigquery_warehouse(&config, &cli.global).await?);

    let embedding_endpoint = format!(
        "https://{}-aiplatform.googleapis.com/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
        config.warehouse_location, config.warehouse_project, config.warehouse_location, config.embedding_model
    );
    let embedding_provider: Arc<dyn EmbeddingProvider> = Arc::new(VertexEmbeddingProvider::new(
        embedding_endpoint,
        config.llm_api_key.clone(),
        config.embedding_model.clone(),
        768,
    ));

    match cli.command {
        Commands::Ask(args) => ask(&config, catalog, warehouse, embedding_provider, args).await,
        Commands::Embed(args) => embed(&config, catalog, warehouse, embedding_provider, args).await,
    }
}

async fn bigquery_warehouse(config: &AgentConfig, global: &GlobalArgs) -> Nl2SqlResult<BigQueryWarehouse> {
    match &global.service_account_key {
        Some(path) => {
            BigQueryWarehouse::from_service_account_key_file(path, &config.warehouse_project, &config.warehouse_location, &config.metadata_dataset)
                .await
        }
        None => Err(Nl2SqlError::Config(nl2sql_core::ConfigError::MissingRequired {
            field: "service_account_key (--service-account-key or NL2SQL_SERVICE_ACCOUNT_KEY)".to_string(),
        })),
    }
}

async fn ask(
    config: &AgentConfig,
    catalog: Arc<nl2sql_catalog::Catalog>,
    warehouse: Arc<BigQueryWarehouse>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    args: AskArgs,
) -> Nl2SqlResult<()> {
    let search_config = SearchConfig {
        column_top_k: config.column_search_top_k,
        max_per_table: config.column_search_max_per_table,
        table_top_k: config.table_search_top_k,
        ..SearchConfig::default()
    };
    let retrieval = Arc::new(RetrievalEngine::new(
        warehouse.clone(),
        embedding_provider,
        config.warehouse_project.clone(),
        config.metadata_dataset.clone(),
        search_config,
    ));
    let sql_pipeline = Arc::new(SqlPipeline::new(
        warehouse.clone(),
        config.row_cap as usize,
        Duration::from_secs(config.query_timeout_secs),
        Duration::from_secs(config.fetch_timeout_secs),
    ));
    let chat_provider: Arc<dyn ChatProvider> = Arc::new(OpenAiCompatChatProvider::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));

    let agent = Agent::new(config.clone(), catalog, retrieval, sql_pipeline, chat_provider, warehouse);
    let answer = agent.ask(&args.question).await?;
    println!("{answer}");
    Ok(())
}

async fn embed(
    config: &AgentConfig,
    catalog: Arc<nl2sql_catalog::Catalog>,
    warehouse: Arc<BigQueryWarehouse>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    args: EmbedArgs,
) -> Nl2SqlResult<()> {
    let pipeline = EmbeddingPipeline::new(
        warehouse,
        embedding_provider,
        catalog,
        config.gold_dataset.clone(),
        config.silver_dataset.clone(),
        config.metadata_dataset.clone(),
        args.force,
    );

    let steps = match &args.step {
        Some(name) => {
            let step = Step::from_str(name).ok_or_else(|| {
                Nl2SqlError::Config(nl2sql_core::ConfigError::InvalidValue {
                    field: "--step".to_string(),
                    value: name.clone(),
                    reason: "not a recognised embedding pipeline step".to_string(),
                })
            })?;
            vec![step]
        }
        None => Step::ALL.to_vec(),
    };

    let mut failed = false;
    for step in steps {
        match pipeline.run_step(step).await {
            Ok(report) => println!("{:<20} rows_affected={:<6} {}", report.step.as_str(), report.rows_affected, report.message),
            Err(err) => {
                failed = true;
                eprintln!("{:<20} FAILED: {err}", step.as_str());
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
