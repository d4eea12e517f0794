//! SQL pipeline (C4): the shared DML guard, auto-LIMIT enforcement,
//! dry-run/execute orchestration, and the learning-loop write-back.

mod guard;
mod learning;
mod limit;
mod pipeline;

pub use guard::is_blocked;
pub use learning::{record_validated_query, ValidatedQuery};
pub use limit::ensure_limit;
pub use pipeline::{ExecuteOutcome, SqlPipeline};
