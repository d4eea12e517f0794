//! Vertex-AI-style embedding provider: one HTTP endpoint, task-typed
//! requests (`RETRIEVAL_DOCUMENT` vs `RETRIEVAL_QUERY`), batched calls.
//! Client shape grounded on
//! `caliber-llm::providers::anthropic::AnthropicClient` (rate-limited
//! `reqwest::Client`, structured error mapping).

use async_trait::async_trait;
use nl2sql_core::{EmbeddingProvider, EmbeddingVector, LlmError, Nl2SqlError, Nl2SqlResult, TaskType};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

#[derive(Debug, Serialize)]
struct EmbedInstance<'a> {
    content: &'a str,
    task_type: &'a str,
}

#[derive(Debug, Serialize)]
struct EmbedRequestBody<'a> {
    instances: Vec<EmbedInstance<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponseBody {
    predictions: Vec<EmbedPrediction>,
}

#[derive(Debug, Deserialize)]
struct EmbedPrediction {
    embeddings: EmbedValues,
}

#[derive(Debug, Deserialize)]
struct EmbedValues {
    /// Generation output is flattened to a single vector per row before
    /// joining back into the search index (spec §4.2).
    values: Vec<f32>,
}

/// HTTP client for a Vertex-AI-style text embedding model.
pub struct VertexEmbeddingProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model_id: String,
    dimensions: i32,
    rate_limiter: Arc<Semaphore>,
    min_request_interval: Duration,
    last_request: std::sync::Mutex<Instant>,
}

impl VertexEmbeddingProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model_id: impl Into<String>, dimensions: i32) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            dimensions,
            rate_limiter: Arc::new(Semaphore::new(16)),
            min_request_interval: Duration::from_millis(20),
            last_request: std::sync::Mutex::new(Instant::now() - Duration::from_secs(1)),
        }
    }

    async fn throttle(&self) {
        let _permit = self.rate_limiter.acquire().await;
        let wait = {
            let mut last = self.last_request.lock().unwrap();
            let elapsed = last.elapsed();
            let wait = self.min_request_interval.saturating_sub(elapsed);
            *last = Instant::now();
            wait
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    async fn embed_one(&self, text: &str, task: TaskType) -> Nl2SqlResult<EmbeddingVector> {
        let vectors = self.embed_many(&[text], task).await?;
        vectors.into_iter().next().ok_or_else(|| {
            Nl2SqlError::Llm(LlmError::InvalidResponse {
                provider: "vertex-embedding".to_string(),
                reason: "empty predictions array".to_string(),
            })
        })
    }

    async fn embed_many(&self, texts: &[&str], task: TaskType) -> Nl2SqlResult<Vec<EmbeddingVector>> {
        self.throttle().await;

        let body = EmbedRequestBody {
            instances: texts
                .iter()
                .map(|t| EmbedInstance {
                    content: t,
                    task_type: task.as_api_str(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Nl2SqlError::Llm(LlmError::RequestFailed {
                    provider: "vertex-embedding".to_string(),
                    status: 0,
                    message: e.to_string(),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Nl2SqlError::Llm(LlmError::RequestFailed {
                provider: "vertex-embedding".to_string(),
                status: status.as_u16(),
                message: text,
            }));
        }

        let parsed: EmbedResponseBody = response.json().await.map_err(|e| {
            Nl2SqlError::Llm(LlmError::InvalidResponse {
                provider: "vertex-embedding".to_string(),
                reason: e.to_string(),
            })
        })?;

        Ok(parsed
            .predictions
            .into_iter()
            .map(|p| EmbeddingVector::new(p.embeddings.values, self.model_id.clone()))
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for VertexEmbeddingProvider {
    async fn embed(&self, text: &str, task: TaskType) -> Nl2SqlResult<EmbeddingVector> {
        self.embed_one(text, task).await
    }

    async fn embed_batch(&self, texts: &[&str], task: TaskType) -> Nl2SqlResult<Vec<EmbeddingVector>> {
        self.embed_many(texts, task).await
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_with_expected_dimensions() {
        let provider = VertexEmbeddingProvider::new("http://localhost", "key", "text-embedding-005", 768);
        assert_eq!(provider.dimensions(), 768);
        assert_eq!(provider.model_id(), "text-embedding-005");
    }
}
