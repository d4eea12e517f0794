//! CLI argument definitions (clap derive API), grounded on the
//! datastx-Feather-Flow `ff-cli` shape: global args flattened into
//! every subcommand, one `Args` struct per subcommand.

use clap::{Args, Parser, Subcommand};

/// Natural-language-to-SQL trading agent.
#[derive(Parser, Debug)]
#[command(name = "nl2sql")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the catalog root ({root}/{gold,silver}/*.yaml, _routing.yaml, glossary.yaml)
    #[arg(long, global = true, default_value = "catalog")]
    pub catalog_root: String,

    /// Path to a GCP service account key file for the warehouse client
    #[arg(long, global = true, env = "NL2SQL_SERVICE_ACCOUNT_KEY")]
    pub service_account_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question and print the agent's final answer.
    Ask(AskArgs),

    /// Run the embedding pipeline's named steps against the search index.
    Embed(EmbedArgs),
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to ask, in natural language
    pub question: String,
}

#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Step to run (default: all steps in order). One of:
    /// create-dataset, verify-model, create-tables, populate-schema,
    /// populate-columns, populate-glossary, populate-symbols,
    /// generate-embeddings, create-indexes, test-search.
    #[arg(long)]
    pub step: Option<String>,

    /// Switch every DDL step to destructive CREATE OR REPLACE.
    #[arg(long)]
    pub force: bool,
}
