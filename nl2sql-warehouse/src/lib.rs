//! Warehouse client abstraction (C4). Defines the `Warehouse` trait the
//! SQL pipeline and agent tools execute against, a BigQuery
//! implementation, and the shared result-sanitisation layer applied at
//! both the executor boundary and the client boundary (spec §4.4 "apply
//! once at the executor... apply again at the client boundary as
//! defence in depth").

mod admin;
mod bigquery;
mod query_memory;
mod sanitize;

pub use admin::AdminWarehouse;
pub use bigquery::BigQueryWarehouse;
pub use query_memory::{InsertOutcome, QueryMemoryStore, ValidatedQueryRow};
pub use sanitize::{sanitize_row, sanitize_value, FieldSchema};

use async_trait::async_trait;
use nl2sql_core::Nl2SqlResult;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Outcome of a dry-run preflight (spec §4.4 "Dry run").
#[derive(Debug, Clone, PartialEq)]
pub enum DryRunOutcome {
    Valid { estimated_bytes: i64 },
    Invalid { warehouse_message: String },
}

/// A single sanitised result row: column name to JSON-safe value.
pub type Row = HashMap<String, Value>;

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub truncated: bool,
}

/// Abstraction over the analytical warehouse. Every method takes
/// already-guarded, already-validated SQL — `nl2sql-sql` is responsible
/// for running the DML guard before any of these are called.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// No-execute plan request; never mutates, never incurs execution cost.
    async fn dry_run(&self, sql: &str) -> Nl2SqlResult<DryRunOutcome>;

    /// Execute `sql`, capping the result at `row_cap` rows and the job
    /// at `query_timeout`; an outer `fetch_timeout` bounds materialising
    /// rows once the job completes.
    async fn execute(
        &self,
        sql: &str,
        row_cap: usize,
        query_timeout: Duration,
        fetch_timeout: Duration,
    ) -> Nl2SqlResult<QueryResult>;

    /// Fully qualified project id, for building `` `{project}.{dataset}.{table}` `` references.
    fn project(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_outcome_variants_are_distinguishable() {
        let valid = DryRunOutcome::Valid { estimated_bytes: 1024 };
        let invalid = DryRunOutcome::Invalid {
            warehouse_message: "no such column".to_string(),
        };
        assert_ne!(valid, invalid);
    }
}
