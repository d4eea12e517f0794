//! Learning-loop write-back (spec §4.4 "Learning loop"). Thin wrapper
//! over `QueryMemoryStore` so the agent controller has one call site
//! that already knows how to split the comma-joined table list.

use nl2sql_core::Nl2SqlResult;
use nl2sql_warehouse::{InsertOutcome, QueryMemoryStore, ValidatedQueryRow};

pub struct ValidatedQuery {
    pub question: String,
    pub sql: String,
    pub tables: Vec<String>,
    pub dataset: String,
    pub complexity: String,
    pub routing_signal: String,
    pub validator: String,
}

pub async fn record_validated_query(store: &dyn QueryMemoryStore, query: ValidatedQuery) -> Nl2SqlResult<InsertOutcome> {
    store
        .insert_validated(ValidatedQueryRow {
            question: query.question,
            sql: query.sql,
            tables: query.tables,
            dataset: query.dataset,
            complexity: query.complexity,
            routing_signal: query.routing_signal,
            validator: query.validator,
        })
        .await
}
