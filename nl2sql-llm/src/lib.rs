//! LLM provider adapters: embedding generation, tool-calling chat
//! completion, and a circuit breaker guarding both against repeated
//! upstream failure.

mod chat_provider;
mod embedding_provider;
mod registry;

pub use chat_provider::OpenAiCompatChatProvider;
pub use embedding_provider::VertexEmbeddingProvider;
pub use registry::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
