//! Query-memory write path (spec §4.4 "Learning loop"). Kept separate
//! from `Warehouse::execute` because validated rows are inserted by the
//! system, not composed by the LLM — they must never pass through the
//! DML guard, which exists specifically to stop the LLM from writing.

use async_trait::async_trait;
use nl2sql_core::Nl2SqlResult;

/// A trader-confirmed question/SQL pair ready to be appended to
/// query-memory.
#[derive(Debug, Clone)]
pub struct ValidatedQueryRow {
    pub question: String,
    pub sql: String,
    pub tables: Vec<String>,
    pub dataset: String,
    pub complexity: String,
    pub routing_signal: String,
    pub validator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row inserted and embedding generation queued/completed.
    Success,
    /// Row inserted but embedding generation failed; the row will be
    /// picked up by the next `generate-embeddings` refresh.
    PartialSuccess,
}

#[async_trait]
pub trait QueryMemoryStore: Send + Sync {
    async fn insert_validated(&self, row: ValidatedQueryRow) -> Nl2SqlResult<InsertOutcome>;
}
