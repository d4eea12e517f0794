//! Dry-run/execute pipeline (spec §4.4). Wraps a `Warehouse` with the
//! guard and auto-LIMIT so every caller gets both for free; there is no
//! path to `Warehouse::execute` that skips them.

use nl2sql_core::Nl2SqlResult;
use nl2sql_warehouse::{sanitize_value, DryRunOutcome, Row, Warehouse};
use std::sync::Arc;
use std::time::Duration;

use crate::guard::is_blocked;
use crate::limit::ensure_limit;

#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    pub rows: Vec<Row>,
    pub truncated: bool,
    pub warning: Option<String>,
}

pub struct SqlPipeline {
    warehouse: Arc<dyn Warehouse>,
    row_cap: usize,
    query_timeout: Duration,
    fetch_timeout: Duration,
}

impl SqlPipeline {
    pub fn new(warehouse: Arc<dyn Warehouse>, row_cap: usize, query_timeout: Duration, fetch_timeout: Duration) -> Self {
        Self {
            warehouse,
            row_cap,
            query_timeout,
            fetch_timeout,
        }
    }

    /// Guard, then dry-run. The guard rejection is the only case that
    /// surfaces as an `Err` here; an invalid plan is a normal `Ok`
    /// result so the agent layer can count it toward the dry-run retry
    /// budget without treating it as a Rust-level failure.
    pub async fn dry_run(&self, sql: &str) -> Nl2SqlResult<DryRunOutcome> {
        if let Some(reason) = is_blocked(sql) {
            return Err(reason.into());
        }
        self.warehouse.dry_run(sql).await
    }

    pub async fn execute(&self, sql: &str) -> Nl2SqlResult<ExecuteOutcome> {
        if let Some(reason) = is_blocked(sql) {
            return Err(reason.into());
        }

        let limited_sql = ensure_limit(sql, self.row_cap);
        let result = self
            .warehouse
            .execute(&limited_sql, self.row_cap, self.query_timeout, self.fetch_timeout)
            .await?;

        let warning = result
            .truncated
            .then(|| format!("Result truncated at {} rows; narrow your filter for the complete set.", self.row_cap));

        Ok(ExecuteOutcome {
            rows: sanitize_rows(result.rows),
            truncated: result.truncated,
            warning,
        })
    }
}

/// Executor-boundary sanitisation pass (spec §4.4, §9: "apply once at
/// the executor... apply again at the client boundary as defence in
/// depth" — both layers call the same central sanitiser). Per-column
/// type information isn't available this far downstream (it was
/// already consumed at the warehouse client boundary), so this pass
/// re-normalises null sentinels and numeric-string artifacts rather
/// than re-deciding TIMESTAMP-ness; it exists so a `Warehouse`
/// implementation that forgets to sanitise its own output — unlike
/// `BigQueryWarehouse`, which already does — still can't leak raw
/// warehouse values into the tool-result JSON.
fn sanitize_rows(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .map(|row| row.into_iter().map(|(field, value)| {
            let sanitized = sanitize_value(&field, &value, None);
            (field, sanitized)
        }).collect())
        .collect()
}
