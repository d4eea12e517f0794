//! Error types for NL2SQL agent operations.
//!
//! The taxonomy follows observable kind, not exception type (spec §7):
//! config/catalog errors are fatal at startup/load, guard/dry-run/loop
//! errors are recoverable and surfaced to the LLM as structured tool
//! results, and sanitisation errors always degrade rather than fail.

use thiserror::Error;

/// Catalog loading/validation errors (C1). Fatal at load time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse YAML in {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("table not found: dataset={dataset} table={table}")]
    TableNotFound { dataset: String, table: String },

    #[error("partition_field {field:?} on table {dataset}.{table} does not name a real column")]
    UnknownPartitionField {
        dataset: String,
        table: String,
        field: String,
    },

    #[error("column {column} referenced by {dataset}.{table}.{via} does not exist in the catalog")]
    DanglingColumnReference {
        dataset: String,
        table: String,
        via: String,
        column: String,
    },

    #[error("{dataset}.{table}.{column}: typical_aggregation set but category is not 'measure'")]
    AggregationRequiresMeasure {
        dataset: String,
        table: String,
        column: String,
    },

    #[error("{dataset}.{table}.{column}: comprehensive=true but example_values is empty")]
    ComprehensiveRequiresExamples {
        dataset: String,
        table: String,
        column: String,
    },

    #[error("{dataset}.{table}.{column}: example_values has {len} entries, max is 25")]
    TooManyExampleValues {
        dataset: String,
        table: String,
        column: String,
        len: usize,
    },

    #[error("{dataset}.{table}.{column}: related_columns has {len} entries, max is 5")]
    TooManyRelatedColumns {
        dataset: String,
        table: String,
        column: String,
        len: usize,
    },

    #[error("{dataset}.{table}.{column}: formula must be a single line")]
    MultilineFormula {
        dataset: String,
        table: String,
        column: String,
    },

    #[error("few-shot example for dataset {dataset} references unknown table {table}")]
    FewShotUnknownTable { dataset: String, table: String },

    #[error("few-shot example SQL references unknown column {table}.{column}")]
    FewShotUnknownColumn { table: String, column: String },

    #[error("routing rule for dataset {dataset} references unknown table {table}")]
    RoutingUnknownTable { dataset: String, table: String },
}

/// Configuration errors (§6). Fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {field}")]
    MissingRequired { field: String },

    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// DML/multi-statement guard rejection (§4.4). Recoverable — the LLM
/// retries with new SQL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("Only SELECT statements are allowed: found forbidden keyword '{keyword}'")]
    ForbiddenKeyword { keyword: String },

    #[error("Only SELECT statements are allowed: multiple statements detected")]
    MultiStatement,
}

/// Dry-run preflight failure (§4.4, §7). Reported verbatim; the LLM
/// retries up to `N_dry_run_retries`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DryRunError {
    #[error("query plan invalid: {warehouse_message}")]
    Invalid { warehouse_message: String },
}

/// Execution failure (§4.4, §7). May be retried once by the controller,
/// then surfaces to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("query execution timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("permission denied executing query")]
    PermissionDenied,

    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("warehouse error: {reason}")]
    Warehouse { reason: String },
}

/// Embedding generation failure during the learning-loop write (§4.4,
/// §7). Downgrades the result to `partial_success`; never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding generation failed: {reason}")]
    GenerationFailed { reason: String },

    #[error("no embedding provider configured")]
    ProviderNotConfigured,
}

/// Repetition/budget exhaustion (§4.5.3, §7). Blocks further tool calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoopError {
    #[error("tool call repeated {count} times in a row; please rephrase your question or pick a different table")]
    Repeated { count: u32 },

    #[error("tool call budget of {max} exceeded for this turn")]
    BudgetExceeded { max: u32 },

    #[error("maximum dry-run retries reached; please rephrase your question")]
    MaxRetriesReached,
}

/// Best-effort field sanitisation failure (§4.4, §9). Never fatal —
/// callers fall back to a string representation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanitisationError {
    #[error("could not sanitise field {field}: {reason}")]
    Unrepresentable { field: String, reason: String },
}

/// Embedding-vector errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: i32, got: i32 },

    #[error("invalid vector: {reason}")]
    InvalidVector { reason: String },
}

/// LLM provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("no LLM provider configured")]
    ProviderNotConfigured,

    #[error("request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("circuit open for provider {provider}")]
    CircuitOpen { provider: String },
}

/// Master error type for all NL2SQL agent operations.
#[derive(Debug, Clone, Error)]
pub enum Nl2SqlError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("guard error: {0}")]
    Guard(#[from] GuardError),

    #[error("dry run error: {0}")]
    DryRun(#[from] DryRunError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("loop error: {0}")]
    Loop(#[from] LoopError),

    #[error("sanitisation error: {0}")]
    Sanitisation(#[from] SanitisationError),

    #[error("vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Result type alias for NL2SQL agent operations.
pub type Nl2SqlResult<T> = Result<T, Nl2SqlError>;
