//! The retrieval engine itself (spec §4.3 responsibility): given a
//! question, run the combined search (falling back to table-level
//! search on column-index failure) and return one structured result.

use nl2sql_core::{EmbeddingProvider, Nl2SqlResult, TaskType};
use std::sync::Arc;
use tracing::warn;

use crate::search::{
    aggregate_by_table, build_combined_search_sql, build_table_fallback_sql, example_candidates, glossary_candidates,
    parse_search_hits, ExampleCandidate, GlossaryCandidate, SearchConfig, SearchHit, SearchWarehouse, TableCandidate,
};
use crate::semantic_cache::{probe_semantic_cache, CacheOutcome};

/// One structured result covering candidate tables with relevant
/// columns, top glossary hits, and top few-shot examples (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub tables: Vec<TableCandidate>,
    pub glossary: Vec<GlossaryCandidate>,
    pub examples: Vec<ExampleCandidate>,
    /// Whether the column-level search errored and this result came
    /// from the table-level fallback instead (spec §4.3.1 "Fallback").
    /// Currently log-only per the spec's open question — exposed here
    /// so a caller can choose to surface it later without re-plumbing.
    pub used_table_fallback: bool,
}

pub struct RetrievalEngine {
    warehouse: Arc<dyn SearchWarehouse>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    project: String,
    metadata_dataset: String,
    config: SearchConfig,
}

impl RetrievalEngine {
    pub fn new(
        warehouse: Arc<dyn SearchWarehouse>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        project: impl Into<String>,
        metadata_dataset: impl Into<String>,
        config: SearchConfig,
    ) -> Self {
        Self {
            warehouse,
            embedding_provider,
            project: project.into(),
            metadata_dataset: metadata_dataset.into(),
            config,
        }
    }

    /// Embed the question once, run the combined search, and aggregate
    /// into the shape callers need for prompt assembly.
    pub async fn search(&self, question: &str) -> Nl2SqlResult<RetrievalResult> {
        let vector = self.embedding_provider.embed(question, TaskType::RetrievalQuery).await?;
        let sql = build_combined_search_sql(&self.project, &self.metadata_dataset, &vector, &self.config);

        match self.warehouse.combined_search(&sql).await {
            Ok(rows) => {
                let hits = parse_search_hits(&rows);
                Ok(RetrievalResult {
                    tables: aggregate_by_table(&hits, self.config.max_per_table),
                    glossary: glossary_candidates(&hits, self.config.glossary_top_k),
                    examples: example_candidates(&hits, self.config.query_memory_top_k),
                    used_table_fallback: false,
                })
            }
            Err(err) => {
                warn!(error = %err, "column-level search failed, falling back to table-level search");
                let fallback_sql = build_table_fallback_sql(&self.project, &self.metadata_dataset, &vector, self.config.table_top_k);
                let rows = self.warehouse.table_fallback_search(&fallback_sql).await?;
                let hits = parse_search_hits(&rows);
                let tables = hits
                    .into_iter()
                    .filter_map(|hit| match hit {
                        SearchHit::Table { dataset, table, distance } => Some(TableCandidate {
                            dataset,
                            table,
                            min_distance: distance,
                            hit_count: 1,
                            columns: Vec::new(),
                        }),
                        _ => None,
                    })
                    .collect();
                Ok(RetrievalResult {
                    tables,
                    glossary: Vec::new(),
                    examples: Vec::new(),
                    used_table_fallback: true,
                })
            }
        }
    }

    /// Semantic-cache probe (spec §4.3.3), delegating to the same
    /// warehouse/embedding provider this engine already holds so the
    /// controller doesn't need a second handle to either.
    pub async fn probe_semantic_cache(&self, question: &str, threshold: f32, allowed_datasets: Option<&[String]>) -> Nl2SqlResult<CacheOutcome> {
        probe_semantic_cache(
            self.warehouse.as_ref(),
            self.embedding_provider.as_ref(),
            &self.project,
            &self.metadata_dataset,
            question,
            threshold,
            allowed_datasets,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nl2sql_core::{EmbeddingVector, Nl2SqlError, Nl2SqlResult, VectorError};
    use nl2sql_warehouse::Row;
    use serde_json::json;

    struct FakeEmbeddingProvider;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbeddingProvider {
        async fn embed(&self, _text: &str, _task: TaskType) -> Nl2SqlResult<EmbeddingVector> {
            Ok(EmbeddingVector::new(vec![1.0, 0.0], "fake-model"))
        }

        async fn embed_batch(&self, texts: &[&str], task: TaskType) -> Nl2SqlResult<Vec<EmbeddingVector>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text, task).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> i32 {
            2
        }

        fn model_id(&self) -> &str {
            "fake-model"
        }
    }

    struct HealthyWarehouse;

    #[async_trait]
    impl SearchWarehouse for HealthyWarehouse {
        async fn combined_search(&self, _sql: &str) -> Nl2SqlResult<Vec<Row>> {
            let mut row = Row::new();
            row.insert("source".to_string(), json!("column"));
            row.insert("dataset".to_string(), json!("gold_omx"));
            row.insert("table_name".to_string(), json!("daily_edge"));
            row.insert("column_name".to_string(), json!("notional_usd"));
            row.insert("embed_text".to_string(), json!("trade notional"));
            row.insert("distance".to_string(), json!(0.05));
            Ok(vec![row])
        }

        async fn table_fallback_search(&self, _sql: &str) -> Nl2SqlResult<Vec<Row>> {
            panic!("fallback should not be used when combined_search succeeds");
        }

        async fn semantic_cache_probe(&self, _sql: &str) -> Nl2SqlResult<Option<Row>> {
            Ok(None)
        }
    }

    struct FailingThenFallbackWarehouse;

    #[async_trait]
    impl SearchWarehouse for FailingThenFallbackWarehouse {
        async fn combined_search(&self, _sql: &str) -> Nl2SqlResult<Vec<Row>> {
            Err(Nl2SqlError::Vector(VectorError::InvalidVector {
                reason: "column index missing".to_string(),
            }))
        }

        async fn table_fallback_search(&self, _sql: &str) -> Nl2SqlResult<Vec<Row>> {
            let mut row = Row::new();
            row.insert("source".to_string(), json!("table"));
            row.insert("dataset".to_string(), json!("gold_omx"));
            row.insert("table_name".to_string(), json!("daily_edge"));
            row.insert("distance".to_string(), json!(0.1));
            Ok(vec![row])
        }

        async fn semantic_cache_probe(&self, _sql: &str) -> Nl2SqlResult<Option<Row>> {
            Ok(None)
        }
    }

    fn engine(warehouse: Arc<dyn SearchWarehouse>) -> RetrievalEngine {
        RetrievalEngine::new(warehouse, Arc::new(FakeEmbeddingProvider), "proj", "metadata", SearchConfig::default())
    }

    #[tokio::test]
    async fn successful_combined_search_returns_table_candidates() {
        let result = engine(Arc::new(HealthyWarehouse)).search("what was the edge?").await.unwrap();
        assert!(!result.used_table_fallback);
        assert_eq!(result.tables.len(), 1);
        assert_eq!(result.tables[0].table, "daily_edge");
    }

    #[tokio::test]
    async fn combined_search_failure_falls_back_to_table_search() {
        let result = engine(Arc::new(FailingThenFallbackWarehouse)).search("what was the edge?").await.unwrap();
        assert!(result.used_table_fallback);
        assert_eq!(result.tables.len(), 1);
        assert!(result.tables[0].columns.is_empty());
    }
}
