//! LLM provider traits. Pure interface definitions — implementations
//! live in `nl2sql-llm`. Mirrors the split in `caliber-core::llm` /
//! `caliber-api::providers`: traits here, runtime orchestration
//! (registry, circuit breaker) downstream.

use crate::{EmbeddingVector, Nl2SqlResult, TaskType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Async trait for embedding providers (spec §4.2 "shared embedding
/// generation").
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, task: TaskType) -> Nl2SqlResult<EmbeddingVector>;

    async fn embed_batch(
        &self,
        texts: &[&str],
        task: TaskType,
    ) -> Nl2SqlResult<Vec<EmbeddingVector>>;

    fn dimensions(&self) -> i32;

    fn model_id(&self) -> &str;
}

/// A single message in a tool-calling chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Set only on a `Tool` role message: which call this is answering.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool the LLM may call, described by name, human description, and a
/// JSON Schema for its parameters (spec §4.5.1 "parameter shapes are
/// primitive... to preserve schema discovery by the LLM").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// A tool invocation the LLM emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// What the model produced for a single turn of the tool-calling loop:
/// either plain text (final answer) or one or more tool calls to
/// execute before continuing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatCompletion {
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Async trait for tool-calling chat providers (spec §4.5 "the LLM
/// loop"). Implementations live in `nl2sql-llm`.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Nl2SqlResult<ChatCompletion>;

    fn model_id(&self) -> &str;
}
