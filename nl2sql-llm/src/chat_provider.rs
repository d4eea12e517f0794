//! Tool-calling chat completion client (spec §4.5). The teacher's
//! `caliber-llm::providers::anthropic` client only ever produced plain
//! text; the agent controller here needs tool calls, so the message
//! and completion types are extended accordingly while keeping the
//! same rate-limited `reqwest::Client` shape.

use async_trait::async_trait;
use nl2sql_core::{
    ChatCompletion, ChatMessage, ChatProvider, ChatRole, LlmError, Nl2SqlError, Nl2SqlResult,
    ToolCall, ToolDefinition,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    name: &'a str,
    arguments: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ResponseFunctionCall {
    name: String,
    arguments: String,
}

fn role_str(role: &ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    }
}

/// OpenAI-compatible tool-calling chat client, rate-limited the same
/// way the teacher's Anthropic client is (bounded concurrency via a
/// semaphore rather than a fixed inter-request delay, since completion
/// calls are far longer-running than embedding calls).
pub struct OpenAiCompatChatProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model_id: String,
    concurrency: Arc<Semaphore>,
}

impl OpenAiCompatChatProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            concurrency: Arc::new(Semaphore::new(8)),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatChatProvider {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Nl2SqlResult<ChatCompletion> {
        let _permit = self.concurrency.acquire().await;

        let wire_messages: Vec<WireMessage> = messages
            .iter()
            .map(|m| WireMessage {
                role: role_str(&m.role),
                content: &m.content,
                tool_calls: m
                    .tool_calls
                    .iter()
                    .map(|tc| WireToolCall {
                        id: &tc.id,
                        name: &tc.name,
                        arguments: &tc.arguments,
                    })
                    .collect(),
                tool_call_id: m.tool_call_id.as_deref(),
            })
            .collect();

        let wire_tools: Vec<WireTool> = tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect();

        let body = ChatRequestBody {
            model: &self.model_id,
            messages: wire_messages,
            tools: wire_tools,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Nl2SqlError::Llm(LlmError::RequestFailed {
                    provider: "openai-compat-chat".to_string(),
                    status: 0,
                    message: e.to_string(),
                })
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(Nl2SqlError::Llm(LlmError::RateLimited {
                provider: "openai-compat-chat".to_string(),
            }));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Nl2SqlError::Llm(LlmError::RequestFailed {
                provider: "openai-compat-chat".to_string(),
                status: status.as_u16(),
                message: text,
            }));
        }

        let parsed: ChatResponseBody = response.json().await.map_err(|e| {
            Nl2SqlError::Llm(LlmError::InvalidResponse {
                provider: "openai-compat-chat".to_string(),
                reason: e.to_string(),
            })
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            Nl2SqlError::Llm(LlmError::InvalidResponse {
                provider: "openai-compat-chat".to_string(),
                reason: "empty choices array".to_string(),
            })
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or(serde_json::Value::Null);
                ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }
            })
            .collect();

        Ok(ChatCompletion {
            content: choice.message.content,
            tool_calls,
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_str_covers_all_roles() {
        assert_eq!(role_str(&ChatRole::System), "system");
        assert_eq!(role_str(&ChatRole::User), "user");
        assert_eq!(role_str(&ChatRole::Assistant), "assistant");
        assert_eq!(role_str(&ChatRole::Tool), "tool");
    }

    #[test]
    fn constructs_with_expected_model_id() {
        let provider = OpenAiCompatChatProvider::new("http://localhost", "key", "gpt-4o-mini");
        assert_eq!(provider.model_id(), "gpt-4o-mini");
    }
}
