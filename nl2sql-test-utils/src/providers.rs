//! Deterministic fake `EmbeddingProvider`/`ChatProvider` (spec §4.2,
//! §4.5). The embedding fake is a real (if toy) function of its input —
//! same text always yields the same vector, different text yields a
//! different one — the same shape as `caliber-test-utils::MockEmbeddingProvider`.
//! The chat fake is scripted: it replays a queue of canned completions,
//! one per `complete` call, so a test can script an exact tool-calling
//! transcript.

use async_trait::async_trait;
use nl2sql_core::{ChatCompletion, ChatMessage, ChatProvider, EmbeddingProvider, EmbeddingVector, LlmError, Nl2SqlError, Nl2SqlResult, TaskType, ToolDefinition};
use std::sync::Mutex;

/// Embeds text by folding its bytes into a fixed-width vector and
/// normalising, so cosine similarity between two embeddings reflects
/// byte overlap rather than being arbitrary. Good enough to exercise
/// ranking/tie-break logic without a real embedding model.
#[derive(Debug, Clone)]
pub struct FakeEmbeddingProvider {
    model_id: String,
    dimensions: i32,
}

impl FakeEmbeddingProvider {
    pub fn new(model_id: impl Into<String>, dimensions: i32) -> Self {
        Self { model_id: model_id.into(), dimensions }
    }

    fn generate(&self, text: &str, task: TaskType) -> Vec<f32> {
        let mut data = vec![0.0f32; self.dimensions as usize];
        // Task type shifts the fold so a document embedding and a query
        // embedding of the same text aren't bit-identical, matching the
        // real provider's direction-dependent output without requiring
        // an actual model call.
        let offset = match task {
            TaskType::RetrievalDocument => 0u8,
            TaskType::RetrievalQuery => 1u8,
        };
        for (i, byte) in text.bytes().enumerate() {
            let idx = i % data.len().max(1);
            if !data.is_empty() {
                data[idx] += ((byte.wrapping_add(offset)) as f32) / 255.0;
            }
        }
        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut data {
                *x /= norm;
            }
        }
        data
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddingProvider {
    async fn embed(&self, text: &str, task: TaskType) -> Nl2SqlResult<EmbeddingVector> {
        Ok(EmbeddingVector::new(self.generate(text, task), self.model_id.clone()))
    }

    async fn embed_batch(&self, texts: &[&str], task: TaskType) -> Nl2SqlResult<Vec<EmbeddingVector>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text, task).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// A scripted `ChatProvider`: returns the next queued completion on
/// every call, in order, and records every call's messages/tools for
/// later assertion. Exhausting the queue is an `Llm` error rather than
/// a panic, so a test that over-calls it fails with a normal `Result`
/// instead of aborting.
pub struct FakeChatProvider {
    model_id: String,
    queue: Mutex<Vec<ChatCompletion>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeChatProvider {
    pub fn new(model_id: impl Into<String>, script: Vec<ChatCompletion>) -> Self {
        Self {
            model_id: model_id.into(),
            queue: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The message list passed to each `complete` call so far, in order.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatProvider for FakeChatProvider {
    async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolDefinition]) -> Nl2SqlResult<ChatCompletion> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let mut queue = self.queue.lock().unwrap();
        if queue.is_empty() {
            return Err(Nl2SqlError::Llm(LlmError::ProviderNotConfigured));
        }
        Ok(queue.remove(0))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_embeds_identically_different_text_does_not() {
        let provider = FakeEmbeddingProvider::new("fake-embed", 16);
        let a = provider.embed("daily notional", TaskType::RetrievalDocument).await.unwrap();
        let b = provider.embed("daily notional", TaskType::RetrievalDocument).await.unwrap();
        let c = provider.embed("something else entirely", TaskType::RetrievalDocument).await.unwrap();
        assert_eq!(a.data, b.data);
        assert_ne!(a.data, c.data);
    }

    #[tokio::test]
    async fn chat_provider_replays_the_script_in_order_then_errors() {
        let provider = FakeChatProvider::new(
            "fake-chat",
            vec![ChatCompletion { content: Some("final answer".to_string()), tool_calls: vec![] }],
        );
        let completion = provider.complete(&[], &[]).await.unwrap();
        assert_eq!(completion.content.as_deref(), Some("final answer"));
        assert!(provider.complete(&[], &[]).await.is_err());
        assert_eq!(provider.call_count(), 2);
    }
}
