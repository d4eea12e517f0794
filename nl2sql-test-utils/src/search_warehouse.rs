//! Fake `SearchWarehouse` (spec §4.3.1): the combined search, its
//! table-level fallback, and the semantic-cache probe each return a
//! configured canned row set regardless of the SQL text, since there is
//! no vector index behind a fake to search against.

use async_trait::async_trait;
use nl2sql_core::Nl2SqlResult;
use nl2sql_retrieval::SearchWarehouse;
use nl2sql_warehouse::Row;
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemorySearchWarehouse {
    combined_rows: RwLock<Vec<Row>>,
    fallback_rows: RwLock<Vec<Row>>,
    cache_row: RwLock<Option<Row>>,
    /// Set to force the next `combined_search` call to error, exercising
    /// the table-level fallback path (spec §4.3.1 "Fallback").
    fail_combined_search: RwLock<bool>,
}

impl InMemorySearchWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_combined_rows(&self, rows: Vec<Row>) {
        *self.combined_rows.write().unwrap() = rows;
    }

    pub fn set_fallback_rows(&self, rows: Vec<Row>) {
        *self.fallback_rows.write().unwrap() = rows;
    }

    pub fn set_cache_row(&self, row: Option<Row>) {
        *self.cache_row.write().unwrap() = row;
    }

    pub fn set_fail_combined_search(&self, fail: bool) {
        *self.fail_combined_search.write().unwrap() = fail;
    }
}

#[async_trait]
impl SearchWarehouse for InMemorySearchWarehouse {
    async fn combined_search(&self, _sql: &str) -> Nl2SqlResult<Vec<Row>> {
        if *self.fail_combined_search.read().unwrap() {
            return Err(nl2sql_core::Nl2SqlError::Execution(nl2sql_core::ExecutionError::Warehouse {
                reason: "column index unavailable".to_string(),
            }));
        }
        Ok(self.combined_rows.read().unwrap().clone())
    }

    async fn table_fallback_search(&self, _sql: &str) -> Nl2SqlResult<Vec<Row>> {
        Ok(self.fallback_rows.read().unwrap().clone())
    }

    async fn semantic_cache_probe(&self, _sql: &str) -> Nl2SqlResult<Option<Row>> {
        Ok(self.cache_row.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn combined_search_can_be_forced_to_fail_for_fallback_testing() {
        let warehouse = InMemorySearchWarehouse::new();
        warehouse.set_fail_combined_search(true);
        assert!(warehouse.combined_search("WITH ...").await.is_err());
    }

    #[tokio::test]
    async fn cache_row_defaults_to_none() {
        let warehouse = InMemorySearchWarehouse::new();
        assert!(warehouse.semantic_cache_probe("SELECT 1").await.unwrap().is_none());
    }
}
