use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single message in the conversation passed to a [`ModelProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Tool definition sent to the model alongside a request (§4.9 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool call extracted from a model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Request to a [`ModelProvider`].
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub tools: Vec<ToolDefinition>,
    /// Raw JSON messages for the tool loop — overrides `messages` when set,
    /// carrying structured `tool_use`/`tool_result` content blocks that a
    /// plain `Message` can't represent.
    pub raw_messages: Option<Vec<serde_json::Value>>,
}

/// Non-streaming response from a [`ModelProvider`].
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
    pub tool_calls: Vec<ToolCall>,
}

/// External capability boundary for a concrete LLM backend (§1 Non-goals:
/// the core does not implement or retry across concrete LLM vendors — it
/// only drives this trait).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// External capability boundary for turning text into an embedding vector
/// (§1 Non-goals: the core does not implement an embedding model).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimension of vectors this embedder produces — callers validate
    /// returned vectors against it.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// External capability boundary for estimating a message's token cost,
/// used by [`crate::context::ContextAssembler`]'s budget accounting.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}
