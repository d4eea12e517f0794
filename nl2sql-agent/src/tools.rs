//! The tool registry (spec §4.5.1): a tagged, bounded set of tools the
//! LLM may call. Modeled as an enum rather than dynamic dispatch — the
//! LLM's tool choice is the only late-bound part of this loop, the
//! handlers themselves are all known at compile time. Parameter shapes
//! stay primitive (strings, numbers, arrays of strings) so schema
//! discovery stays easy for the model (spec §4.5.1).

use nl2sql_core::ToolDefinition;
use serde_json::{json, Value};

/// One entry in the tool registry. `as_str`/`from_str` are the wire
/// names the LLM sees and calls back with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    CheckSemanticCache,
    ResolveExchange,
    VectorSearchColumns,
    FetchFewShotExamples,
    LoadYamlMetadata,
    DryRunSql,
    ExecuteSql,
    SaveValidatedQuery,
}

impl ToolName {
    pub const ALL: [ToolName; 8] = [
        ToolName::CheckSemanticCache,
        ToolName::ResolveExchange,
        ToolName::VectorSearchColumns,
        ToolName::FetchFewShotExamples,
        ToolName::LoadYamlMetadata,
        ToolName::DryRunSql,
        ToolName::ExecuteSql,
        ToolName::SaveValidatedQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CheckSemanticCache => "check_semantic_cache",
            ToolName::ResolveExchange => "resolve_exchange",
            ToolName::VectorSearchColumns => "vector_search_columns",
            ToolName::FetchFewShotExamples => "fetch_few_shot_examples",
            ToolName::LoadYamlMetadata => "load_yaml_metadata",
            ToolName::DryRunSql => "dry_run_sql",
            ToolName::ExecuteSql => "execute_sql",
            ToolName::SaveValidatedQuery => "save_validated_query",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    fn description(&self) -> &'static str {
        match self {
            ToolName::CheckSemanticCache => {
                "Check whether a previously validated query already answers this question. \
                 Call this first for every new question. Invoking it resets this turn's \
                 repetition and retry counters and clears the per-question caches."
            }
            ToolName::ResolveExchange => {
                "Resolve free-form text (an exchange name, code, or symbol) to its gold and \
                 silver dataset names. Call before searching when the question names an exchange."
            }
            ToolName::VectorSearchColumns => {
                "Run the combined vector search over table columns, glossary terms, and past \
                 query examples for this question, returning ranked candidate tables."
            }
            ToolName::FetchFewShotExamples => {
                "Fetch the top validated question/SQL examples relevant to this question."
            }
            ToolName::LoadYamlMetadata => {
                "Load the full catalog metadata for one table: every column, its description, \
                 and the table's dataset-level business context."
            }
            ToolName::DryRunSql => "Validate a candidate SQL query's plan without executing it.",
            ToolName::ExecuteSql => "Execute a validated, read-only SQL query and return its rows.",
            ToolName::SaveValidatedQuery => {
                "Record a question/SQL pair the user has confirmed is correct, so it becomes a \
                 future few-shot example and semantic-cache entry."
            }
        }
    }

    fn parameters_schema(&self) -> Value {
        match self {
            ToolName::CheckSemanticCache => json!({
                "type": "object",
                "properties": {"question": {"type": "string"}},
                "required": ["question"],
            }),
            ToolName::ResolveExchange => json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"],
            }),
            ToolName::VectorSearchColumns => json!({
                "type": "object",
                "properties": {"question": {"type": "string"}},
                "required": ["question"],
            }),
            ToolName::FetchFewShotExamples => json!({
                "type": "object",
                "properties": {"question": {"type": "string"}},
                "required": ["question"],
            }),
            ToolName::LoadYamlMetadata => json!({
                "type": "object",
                "properties": {
                    "dataset": {"type": "string"},
                    "table": {"type": "string"},
                    "question": {"type": "string", "description": "The current question, used only to scope the per-turn cache"},
                },
                "required": ["dataset", "table"],
            }),
            ToolName::DryRunSql => json!({
                "type": "object",
                "properties": {"sql": {"type": "string"}},
                "required": ["sql"],
            }),
            ToolName::ExecuteSql => json!({
                "type": "object",
                "properties": {"sql": {"type": "string"}},
                "required": ["sql"],
            }),
            ToolName::SaveValidatedQuery => json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string"},
                    "sql": {"type": "string"},
                    "tables": {"type": "array", "items": {"type": "string"}},
                    "dataset": {"type": "string"},
                    "complexity": {"type": "string", "enum": ["simple", "moderate", "complex"]},
                    "routing_signal": {"type": "string"},
                    "validator": {"type": "string"},
                },
                "required": ["question", "sql", "tables", "dataset", "complexity", "validator"],
            }),
        }
    }
}

/// The full registry as `ToolDefinition`s, in the order the static
/// prompt's tool-usage contract names them (spec §4.5.6).
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL
        .iter()
        .map(|tool| ToolDefinition {
            name: tool.as_str().to_string(),
            description: tool.description().to_string(),
            parameters_schema: tool.parameters_schema(),
        })
        .collect()
}
