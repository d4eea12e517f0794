//! Embedding pipeline (C2): materialises and refreshes the four
//! search-index tables (schema, column, glossary, query-memory) from
//! the catalog and validated queries.

mod pipeline;
mod refresh;
mod rows;
mod text;

pub use pipeline::{EmbeddingPipeline, PipelineWarehouse, Step, StepReport};
pub use refresh::{needs_embedding, REFRESH_PREDICATE_SQL};
pub use text::{column_embed_text, glossary_embed_text, schema_embed_text};
