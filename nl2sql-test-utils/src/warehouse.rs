//! In-memory fakes for the three warehouse-facing traits (spec §4.4):
//! `Warehouse`, `AdminWarehouse`, `QueryMemoryStore`. The admin/query-memory
//! halves keep a real backing store (upserts actually merge, inserts
//! actually accumulate) the way `caliber-storage::MockStorage` does;
//! `dry_run`/`execute` are scriptable instead, since there is no SQL
//! engine behind them to evaluate an arbitrary query against.

use async_trait::async_trait;
use nl2sql_core::Nl2SqlResult;
use nl2sql_warehouse::{
    AdminWarehouse, DryRunOutcome, InsertOutcome, QueryMemoryStore, QueryResult, Row, ValidatedQueryRow, Warehouse,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Fake `Warehouse` + `AdminWarehouse`. `dry_run`/`execute` return a
/// single configured outcome for every call (set it before exercising
/// the code under test); DDL and upserts are logged and applied to a
/// real in-memory table store so assertions can inspect what was
/// actually written.
pub struct InMemoryWarehouse {
    project: String,
    dry_run_outcome: RwLock<DryRunOutcome>,
    execute_result: RwLock<QueryResult>,
    dry_run_calls: RwLock<Vec<String>>,
    execute_calls: RwLock<Vec<String>>,
    ddl_log: RwLock<Vec<String>>,
    tables: RwLock<HashMap<(String, String), Vec<HashMap<String, Value>>>>,
}

impl InMemoryWarehouse {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dry_run_outcome: RwLock::new(DryRunOutcome::Valid { estimated_bytes: 0 }),
            execute_result: RwLock::new(QueryResult { rows: Vec::new(), truncated: false }),
            dry_run_calls: RwLock::new(Vec::new()),
            execute_calls: RwLock::new(Vec::new()),
            ddl_log: RwLock::new(Vec::new()),
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_dry_run_outcome(&self, outcome: DryRunOutcome) {
        *self.dry_run_outcome.write().unwrap() = outcome;
    }

    pub fn set_execute_result(&self, result: QueryResult) {
        *self.execute_result.write().unwrap() = result;
    }

    pub fn dry_run_calls(&self) -> Vec<String> {
        self.dry_run_calls.read().unwrap().clone()
    }

    pub fn execute_calls(&self) -> Vec<String> {
        self.execute_calls.read().unwrap().clone()
    }

    pub fn ddl_log(&self) -> Vec<String> {
        self.ddl_log.read().unwrap().clone()
    }

    /// Rows currently stored under `dataset.table`, for assertions
    /// against what `populate_*`/`generate_embeddings` wrote.
    pub fn rows(&self, dataset: &str, table: &str) -> Vec<HashMap<String, Value>> {
        self.tables.read().unwrap().get(&(dataset.to_string(), table.to_string())).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn dry_run(&self, sql: &str) -> Nl2SqlResult<DryRunOutcome> {
        self.dry_run_calls.write().unwrap().push(sql.to_string());
        Ok(self.dry_run_outcome.read().unwrap().clone())
    }

    async fn execute(&self, sql: &str, _row_cap: usize, _query_timeout: Duration, _fetch_timeout: Duration) -> Nl2SqlResult<QueryResult> {
        self.execute_calls.write().unwrap().push(sql.to_string());
        Ok(self.execute_result.read().unwrap().clone())
    }

    fn project(&self) -> &str {
        &self.project
    }
}

#[async_trait]
impl AdminWarehouse for InMemoryWarehouse {
    async fn execute_ddl(&self, sql: &str) -> Nl2SqlResult<()> {
        self.ddl_log.write().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn upsert_rows(
        &self,
        dataset: &str,
        table: &str,
        key_fields: &[&str],
        blank_on_update: &[&str],
        rows: Vec<HashMap<String, Value>>,
    ) -> Nl2SqlResult<usize> {
        let mut tables = self.tables.write().unwrap();
        let stored = tables.entry((dataset.to_string(), table.to_string())).or_default();
        let count = rows.len();

        for row in rows {
            let matches = |existing: &HashMap<String, Value>| {
                key_fields.iter().all(|k| existing.get(*k) == row.get(*k))
            };
            if let Some(existing) = stored.iter_mut().find(|e| matches(e)) {
                let mut updated = row.clone();
                for field in blank_on_update {
                    updated.insert(field.to_string(), Value::Null);
                }
                *existing = updated;
            } else {
                stored.push(row);
            }
        }

        Ok(count)
    }
}

/// Fake `QueryMemoryStore` backed by a real accumulating vector, so a
/// test can assert on exactly what was written by the learning loop
/// (spec §4.4 "Learning loop").
#[derive(Default)]
pub struct InMemoryQueryMemoryStore {
    rows: RwLock<Vec<ValidatedQueryRow>>,
    next_outcome: RwLock<Option<InsertOutcome>>,
}

impl InMemoryQueryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the next `insert_validated` call to report this outcome
    /// instead of the default `Success` (e.g. to simulate an embedding
    /// failure that leaves the row pending re-embedding).
    pub fn queue_outcome(&self, outcome: InsertOutcome) {
        *self.next_outcome.write().unwrap() = Some(outcome);
    }

    pub fn rows(&self) -> Vec<ValidatedQueryRow> {
        self.rows.read().unwrap().clone()
    }
}

#[async_trait]
impl QueryMemoryStore for InMemoryQueryMemoryStore {
    async fn insert_validated(&self, row: ValidatedQueryRow) -> Nl2SqlResult<InsertOutcome> {
        self.rows.write().unwrap().push(row);
        Ok(self.next_outcome.write().unwrap().take().unwrap_or(InsertOutcome::Success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_inserts_then_updates_by_key() {
        let warehouse = InMemoryWarehouse::new("proj");
        let mut row = HashMap::new();
        row.insert("dataset".to_string(), Value::String("gold_omx".to_string()));
        row.insert("table_name".to_string(), Value::String("trades".to_string()));
        row.insert("vector".to_string(), Value::String("[1,2,3]".to_string()));

        warehouse
            .upsert_rows("meta", "schema_index", &["dataset", "table_name"], &["vector"], vec![row.clone()])
            .await
            .unwrap();
        assert_eq!(warehouse.rows("meta", "schema_index").len(), 1);

        // Re-upserting the same key blanks `vector` per blank_on_update.
        warehouse
            .upsert_rows("meta", "schema_index", &["dataset", "table_name"], &["vector"], vec![row])
            .await
            .unwrap();
        let stored = warehouse.rows("meta", "schema_index");
        assert_eq!(stored.len(), 1, "same key must update in place, not duplicate");
        assert_eq!(stored[0].get("vector"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn query_memory_store_records_validated_rows() {
        let store = InMemoryQueryMemoryStore::new();
        let outcome = store
            .insert_validated(ValidatedQueryRow {
                question: "how many trades yesterday".to_string(),
                sql: "SELECT COUNT(*) FROM trades".to_string(),
                tables: vec!["trades".to_string()],
                dataset: "gold_omx".to_string(),
                complexity: "simple".to_string(),
                routing_signal: "trades".to_string(),
                validator: "trader@example.com".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Success);
        assert_eq!(store.rows().len(), 1);
    }
}
