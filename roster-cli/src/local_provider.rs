//! Local, no-network stand-ins for the external capability traits
//! (`ModelProvider`, `Embedder`, `TokenCounter`) that `roster-agent`
//! deliberately never implements (§1 Non-goals: the core does not implement
//! or retry across concrete LLM vendors).
//!
//! A real deployment wires its own concrete provider per tier here, in the
//! binary, at startup. Until one is configured, `roster` falls back to this
//! deterministic, local provider so every CLI command is runnable offline;
//! it echoes rather than reasons, and callers should not expect useful
//! completions from it.

use async_trait::async_trait;
use roster_agent::{ChatRequest, ChatResponse, Embedder, ModelProvider, ProviderError, TokenCounter};

/// Echoes the last user message back with a short preamble. No network
/// calls, no API key required.
pub struct LocalEchoProvider {
    tier_name: String,
}

impl LocalEchoProvider {
    pub fn new(tier_name: impl Into<String>) -> Self {
        Self { tier_name: tier_name.into() }
    }
}

#[async_trait]
impl ModelProvider for LocalEchoProvider {
    fn name(&self) -> &str {
        &self.tier_name
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let last_user_text = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, roster_agent::Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let content = format!(
            "[local-echo/{}] no model provider is configured for this tier; received: {last_user_text}",
            self.tier_name
        );
        Ok(ChatResponse {
            tokens_in: req.messages.iter().map(|m| m.content.len() as u32 / 4).sum(),
            tokens_out: content.len() as u32 / 4,
            content,
            model: self.tier_name.clone(),
            stop_reason: "stop".to_string(),
            tool_calls: Vec::new(),
        })
    }
}

/// Hashes text into a fixed-size deterministic vector. Not a real embedding
/// model — similarity scores it produces are meaningless beyond exact or
/// near-exact text matches — but it lets memory recall run end to end
/// without a network dependency.
pub struct LocalHashEmbedder {
    dim: usize,
}

impl LocalHashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl Embedder for LocalHashEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0f32; self.dim];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dim] += byte as f32;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// Whitespace-token approximation, the same rough heuristic providers use
/// before a real tokenizer is wired in.
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        (text.len() / 4).max(text.split_whitespace().count())
    }
}

/// Local stand-in for a `roster_sessions::Summarizer`: concatenates the
/// chunk instead of calling a model, since no concrete `ModelProvider` is
/// wired in by default (§1 Non-goals).
pub struct ConcatSummarizer;

#[async_trait]
impl roster_sessions::Summarizer for ConcatSummarizer {
    async fn summarize(&self, chunk: &[roster_sessions::Message]) -> String {
        let joined = chunk.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join(" / ");
        format!("[compacted {} messages] {joined}", chunk.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_provider_includes_last_user_message() {
        let provider = LocalEchoProvider::new("simple");
        let req = ChatRequest {
            model: "simple".into(),
            system: "sys".into(),
            messages: vec![roster_agent::Message { role: roster_agent::Role::User, content: "hello".into() }],
            max_tokens: 64,
            tools: Vec::new(),
            raw_messages: None,
        };
        let resp = provider.send(&req).await.unwrap();
        assert!(resp.content.contains("hello"));
    }

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let embedder = LocalHashEmbedder::new(8);
        let a = embedder.embed("same text").await.unwrap();
        let b = embedder.embed("same text").await.unwrap();
        assert_eq!(a, b);
    }
}
