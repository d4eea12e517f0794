//! Agent configuration (spec §6). A single strongly-validated struct
//! sourced from environment variables with defaults for tunables.

use crate::{ConfigError, Nl2SqlError, Nl2SqlResult};

/// Master configuration for the agent runtime. Required fields have no
/// default and are read from the environment at construction; tunables
/// fall back to the defaults named in spec §6.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    // Required
    pub warehouse_project: String,
    pub warehouse_location: String,
    pub gold_dataset: String,
    pub silver_dataset: String,
    pub metadata_dataset: String,
    pub embedding_model: String,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,

    // Tunable, with defaults
    pub semantic_cache_threshold: f32,
    pub table_search_top_k: usize,
    pub column_search_top_k: usize,
    pub column_search_max_per_table: usize,
    pub row_cap: u64,
    pub query_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub max_tool_calls_per_turn: u32,
    pub max_consecutive_repeats: u32,
    pub dry_run_max_retries: u32,
    pub sql_preview_chars: usize,
    pub row_preview_count: usize,
}

impl AgentConfig {
    /// Read required fields from the environment, apply defaults for
    /// tunables, and validate. Mirrors `CaliberConfig::default_context`
    /// + `from_env` combined, because unlike the teacher every field
    /// here either comes from the environment or has a named default —
    /// there is no "build a sane default struct for tests" path outside
    /// of `with_defaults_for_tests`.
    pub fn from_env() -> Nl2SqlResult<Self> {
        let config = Self {
            warehouse_project: required_env("NL2SQL_WAREHOUSE_PROJECT")?,
            warehouse_location: required_env("NL2SQL_WAREHOUSE_LOCATION")?,
            gold_dataset: required_env("NL2SQL_GOLD_DATASET")?,
            silver_dataset: required_env("NL2SQL_SILVER_DATASET")?,
            metadata_dataset: required_env("NL2SQL_METADATA_DATASET")?,
            embedding_model: required_env("NL2SQL_EMBEDDING_MODEL")?,
            llm_base_url: required_env("NL2SQL_LLM_BASE_URL")?,
            llm_api_key: required_env("NL2SQL_LLM_API_KEY")?,
            llm_model: required_env("NL2SQL_LLM_MODEL")?,

            semantic_cache_threshold: env_or("NL2SQL_SEMANTIC_CACHE_THRESHOLD", 0.10),
            table_search_top_k: env_or("NL2SQL_TABLE_SEARCH_TOP_K", 5),
            column_search_top_k: env_or("NL2SQL_COLUMN_SEARCH_TOP_K", 30),
            column_search_max_per_table: env_or("NL2SQL_COLUMN_SEARCH_MAX_PER_TABLE", 15),
            row_cap: env_or("NL2SQL_ROW_CAP", 1000),
            query_timeout_secs: env_or("NL2SQL_QUERY_TIMEOUT_SECS", 30),
            fetch_timeout_secs: env_or("NL2SQL_FETCH_TIMEOUT_SECS", 120),
            max_tool_calls_per_turn: env_or("NL2SQL_MAX_TOOL_CALLS_PER_TURN", 50),
            max_consecutive_repeats: env_or("NL2SQL_MAX_CONSECUTIVE_REPEATS", 3),
            dry_run_max_retries: env_or("NL2SQL_DRY_RUN_MAX_RETRIES", 3),
            sql_preview_chars: env_or("NL2SQL_SQL_PREVIEW_CHARS", 500),
            row_preview_count: env_or("NL2SQL_ROW_PREVIEW_COUNT", 3),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a config with sensible defaults and placeholder required
    /// fields, for tests and fixtures that don't need real credentials.
    pub fn with_defaults_for_tests() -> Self {
        Self {
            warehouse_project: "test-project".to_string(),
            warehouse_location: "US".to_string(),
            gold_dataset: "gold".to_string(),
            silver_dataset: "silver".to_string(),
            metadata_dataset: "metadata".to_string(),
            embedding_model: "text-embedding-005".to_string(),
            llm_base_url: "http://localhost:0".to_string(),
            llm_api_key: "test-key".to_string(),
            llm_model: "test-model".to_string(),
            semantic_cache_threshold: 0.10,
            table_search_top_k: 5,
            column_search_top_k: 30,
            column_search_max_per_table: 15,
            row_cap: 1000,
            query_timeout_secs: 30,
            fetch_timeout_secs: 120,
            max_tool_calls_per_turn: 50,
            max_consecutive_repeats: 3,
            dry_run_max_retries: 3,
            sql_preview_chars: 500,
            row_preview_count: 3,
        }
    }

    /// Validate invariants on the tunables. Required string fields are
    /// always non-empty by construction (`required_env` errors first).
    pub fn validate(&self) -> Nl2SqlResult<()> {
        if self.semantic_cache_threshold < 0.0 || self.semantic_cache_threshold > 1.0 {
            return Err(invalid(
                "semantic_cache_threshold",
                self.semantic_cache_threshold.to_string(),
                "must be between 0.0 and 1.0",
            ));
        }
        if self.row_cap == 0 {
            return Err(invalid("row_cap", self.row_cap.to_string(), "must be > 0"));
        }
        if self.query_timeout_secs == 0 {
            return Err(invalid(
                "query_timeout_secs",
                self.query_timeout_secs.to_string(),
                "must be > 0",
            ));
        }
        if self.fetch_timeout_secs < self.query_timeout_secs {
            return Err(invalid(
                "fetch_timeout_secs",
                self.fetch_timeout_secs.to_string(),
                "must be >= query_timeout_secs",
            ));
        }
        if self.max_tool_calls_per_turn == 0 {
            return Err(invalid(
                "max_tool_calls_per_turn",
                self.max_tool_calls_per_turn.to_string(),
                "must be > 0",
            ));
        }
        if self.max_consecutive_repeats == 0 {
            return Err(invalid(
                "max_consecutive_repeats",
                self.max_consecutive_repeats.to_string(),
                "must be > 0",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> Nl2SqlError {
    Nl2SqlError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

fn required_env(name: &str) -> Nl2SqlResult<String> {
    std::env::var(name).map_err(|_| {
        Nl2SqlError::Config(ConfigError::MissingRequired {
            field: name.to_string(),
        })
    })
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
