//! Semantic cache probe (spec §4.3.3). Before retrieval runs, embed the
//! question once and look up the nearest `query_memory` row. A hit is
//! returned only if its distance is within threshold *and*, when an
//! exchange has already been resolved this turn, its dataset is still
//! one of the allowed ones — this is the cross-exchange leak guard from
//! spec §4.3.3 and seed scenario 5, and it lets the controller skip the
//! whole tool chain without reordering it.

use nl2sql_core::{EmbeddingProvider, EmbeddingVector, Nl2SqlResult, TaskType};
use nl2sql_warehouse::Row;

use crate::search::SearchWarehouse;

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticCacheHit {
    pub question: String,
    pub sql: String,
    pub dataset: String,
    pub distance: f32,
}

/// Outcome of a semantic-cache probe. `Miss` carries an optional reason
/// so the cross-exchange case can explain itself to the caller (spec
/// seed scenario 5: "reason: mentions 'different exchange'").
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome {
    Hit(SemanticCacheHit),
    Miss { reason: Option<String> },
}

impl CacheOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheOutcome::Hit(_))
    }
}

fn vector_literal(vector: &EmbeddingVector) -> String {
    format!(
        "[{}]",
        vector.data.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
    )
}

pub fn build_semantic_cache_sql(project: &str, metadata_dataset: &str, question_vector: &EmbeddingVector) -> String {
    let vector = vector_literal(question_vector);
    format!(
        "SELECT base.question AS question, base.sql AS sql, base.dataset AS dataset, distance \
         FROM VECTOR_SEARCH(TABLE `{project}.{metadata_dataset}.query_memory`, 'vector', (SELECT {vector} AS vector), top_k => 1, distance_type => 'COSINE') \
         ORDER BY distance ASC LIMIT 1"
    )
}

/// Run the probe: embed the question (`RETRIEVAL_QUERY`), fetch the
/// nearest row, and apply the threshold and exchange-aware miss rule.
pub async fn probe_semantic_cache(
    warehouse: &dyn SearchWarehouse,
    embedding_provider: &dyn EmbeddingProvider,
    project: &str,
    metadata_dataset: &str,
    question: &str,
    threshold: f32,
    allowed_datasets: Option<&[String]>,
) -> Nl2SqlResult<CacheOutcome> {
    let vector = embedding_provider.embed(question, TaskType::RetrievalQuery).await?;
    let sql = build_semantic_cache_sql(project, metadata_dataset, &vector);
    let row = warehouse.semantic_cache_probe(&sql).await?;
    Ok(evaluate_probe_row(row, threshold, allowed_datasets))
}

fn evaluate_probe_row(row: Option<Row>, threshold: f32, allowed_datasets: Option<&[String]>) -> CacheOutcome {
    let Some(row) = row else {
        return CacheOutcome::Miss { reason: None };
    };

    let distance = row.get("distance").and_then(|v| v.as_f64()).unwrap_or(f64::MAX) as f32;
    if distance > threshold {
        return CacheOutcome::Miss { reason: None };
    }

    let dataset = row.get("dataset").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    if let Some(allowed) = allowed_datasets {
        if !allowed.iter().any(|d| d == &dataset) {
            return CacheOutcome::Miss {
                reason: Some(format!("cached entry is for a different exchange (dataset {dataset})")),
            };
        }
    }

    let question = row.get("question").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let sql = row.get("sql").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    CacheOutcome::Hit(SemanticCacheHit {
        question,
        sql,
        dataset,
        distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(dataset: &str, distance: f64) -> Row {
        let mut row = Row::new();
        row.insert("question".to_string(), json!("what was the edge yesterday?"));
        row.insert("sql".to_string(), json!("SELECT 1"));
        row.insert("dataset".to_string(), json!(dataset));
        row.insert("distance".to_string(), json!(distance));
        row
    }

    #[test]
    fn within_threshold_and_no_exchange_scoping_is_a_hit() {
        let outcome = evaluate_probe_row(Some(row("gold_omx", 0.05)), 0.10, None);
        assert!(outcome.is_hit());
    }

    #[test]
    fn beyond_threshold_is_a_miss() {
        let outcome = evaluate_probe_row(Some(row("gold_omx", 0.5)), 0.10, None);
        assert_eq!(outcome, CacheOutcome::Miss { reason: None });
    }

    #[test]
    fn no_row_is_a_miss() {
        let outcome = evaluate_probe_row(None, 0.10, None);
        assert_eq!(outcome, CacheOutcome::Miss { reason: None });
    }

    #[test]
    fn cross_exchange_dataset_is_a_miss_with_reason() {
        let allowed = vec!["gold_brazil".to_string()];
        let outcome = evaluate_probe_row(Some(row("gold_omx", 0.02)), 0.10, Some(&allowed));
        match outcome {
            CacheOutcome::Miss { reason: Some(reason) } => assert!(reason.contains("different exchange")),
            other => panic!("expected cross-exchange miss, got {other:?}"),
        }
    }

    #[test]
    fn matching_allowed_dataset_is_still_a_hit() {
        let allowed = vec!["gold_omx".to_string()];
        let outcome = evaluate_probe_row(Some(row("gold_omx", 0.02)), 0.10, Some(&allowed));
        assert!(outcome.is_hit());
    }
}
