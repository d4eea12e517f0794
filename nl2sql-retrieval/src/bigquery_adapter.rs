//! `SearchWarehouse` impl for the real BigQuery client. Kept as a
//! separate small adapter rather than folded into `nl2sql-warehouse`
//! itself, since the combined-search/fallback/semantic-cache queries
//! are retrieval-engine concerns (C3), not generic warehouse concerns
//! (C4) — `nl2sql-warehouse` stays ignorant of the search-index schema.

use async_trait::async_trait;
use nl2sql_core::Nl2SqlResult;
use nl2sql_warehouse::{BigQueryWarehouse, Row, Warehouse};
use std::time::Duration;

use crate::search::SearchWarehouse;

const SEARCH_ROW_CAP: usize = 10_000;
const SEARCH_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const SEARCH_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
impl SearchWarehouse for BigQueryWarehouse {
    async fn combined_search(&self, sql: &str) -> Nl2SqlResult<Vec<Row>> {
        let result = Warehouse::execute(self, sql, SEARCH_ROW_CAP, SEARCH_QUERY_TIMEOUT, SEARCH_FETCH_TIMEOUT).await?;
        Ok(result.rows)
    }

    async fn table_fallback_search(&self, sql: &str) -> Nl2SqlResult<Vec<Row>> {
        let result = Warehouse::execute(self, sql, SEARCH_ROW_CAP, SEARCH_QUERY_TIMEOUT, SEARCH_FETCH_TIMEOUT).await?;
        Ok(result.rows)
    }

    async fn semantic_cache_probe(&self, sql: &str) -> Nl2SqlResult<Option<Row>> {
        let result = Warehouse::execute(self, sql, 1, SEARCH_QUERY_TIMEOUT, SEARCH_FETCH_TIMEOUT).await?;
        Ok(result.rows.into_iter().next())
    }
}
