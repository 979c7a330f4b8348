//! Tool contract and bounded tool-use loop (§4.9 step 6).
//!
//! Flow: prompt -> ModelProvider -> if tool_use -> check_action -> execute ->
//! inject tool_result -> ModelProvider -> repeat. Stops when `stop_reason` is
//! not `tool_use`, `max_iterations` is reached, or the provider errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use roster_worklog::ToolOutputStore;

use crate::provider::{ChatRequest, ChatResponse, ModelProvider, ProviderError, ToolCall};

/// Result of executing a tool — the text placed in a `tool_result` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { content: message.into(), is_error: true }
    }
}

/// A single executable tool. Implementors are held behind `Box<dyn Tool>` in
/// a per-bot tool catalog built at AgentLoop construction time.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

/// Tool calls the model made during a tool_loop run, in call order — used to
/// drive the per-call `check_action` + WorkLog entries in the caller's
/// AgentLoop, which owns the RoleCardEnforcer and WorkLog handle that this
/// module intentionally knows nothing about.
pub struct ToolLoopOutcome {
    pub response: ChatResponse,
    pub calls: Vec<ExecutedCall>,
}

pub struct ExecutedCall {
    pub call: ToolCall,
    pub result: ToolResult,
}

/// A per-call gate consulted before a tool executes — the AgentLoop's
/// `RoleCardEnforcer::check_action` bridge (§4.9 step 6a). Returning
/// `Some(reason)` blocks the call; `None` allows it.
#[async_trait]
pub trait ActionGate: Send + Sync {
    async fn check(&self, tool_name: &str, input: &serde_json::Value) -> Option<String>;
}

/// Run the full tool execution loop (non-streaming), bounded at
/// `max_iterations`. `initial_request.messages` seeds the conversation; the
/// loop threads raw JSON content blocks internally to carry `tool_use`/
/// `tool_result` pairs exactly as the model emitted them.
///
/// A `tool_result` whose content exceeds `max_tool_output_chars` is offloaded
/// to `tool_output_store` and replaced with its reference form before it is
/// placed back into the conversation sent to the model, and before it reaches
/// the returned `ExecutedCall` — so persistence and logging downstream never
/// see the oversized content either.
#[allow(clippy::too_many_arguments)]
pub async fn run_tool_loop(
    provider: &dyn ModelProvider,
    initial_request: ChatRequest,
    tools: &[Box<dyn Tool>],
    gate: &dyn ActionGate,
    max_iterations: usize,
    tool_output_store: &ToolOutputStore,
    max_tool_output_chars: usize,
    session_key: &str,
) -> Result<ToolLoopOutcome, ProviderError> {
    let mut raw_messages: Vec<serde_json::Value> = if let Some(ref raw) = initial_request.raw_messages {
        raw.clone()
    } else {
        initial_request
            .messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
            .collect()
    };

    let mut all_calls = Vec::new();
    let mut last_response: Option<ChatResponse> = None;

    for iteration in 0..max_iterations {
        let mut req = initial_request.clone();
        req.raw_messages = Some(raw_messages.clone());

        debug!(iteration, "tool loop iteration");
        let response = provider.send(&req).await?;

        if response.tool_calls.is_empty() || response.stop_reason != "tool_use" {
            info!(iteration, "tool loop complete — no more tool calls");
            return Ok(ToolLoopOutcome { response, calls: all_calls });
        }

        let mut assistant_content: Vec<serde_json::Value> = Vec::new();
        if !response.content.is_empty() {
            assistant_content.push(serde_json::json!({ "type": "text", "text": response.content }));
        }
        for call in &response.tool_calls {
            assistant_content.push(serde_json::json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": call.input,
            }));
        }
        raw_messages.push(serde_json::json!({ "role": "assistant", "content": assistant_content }));

        let mut tool_result_content: Vec<serde_json::Value> = Vec::new();
        for call in &response.tool_calls {
            let result = if let Some(reason) = gate.check(&call.name, &call.input).await {
                ToolResult::error(format!("action blocked by role card: {reason}"))
            } else {
                execute_tool(tools, call).await
            };
            let result = offload_if_oversized(tool_output_store, max_tool_output_chars, session_key, &call.name, result);
            tool_result_content.push(serde_json::json!({
                "type": "tool_result",
                "tool_use_id": call.id,
                "content": result.content,
                "is_error": result.is_error,
            }));
            all_calls.push(ExecutedCall { call: call.clone(), result });
        }
        raw_messages.push(serde_json::json!({ "role": "user", "content": tool_result_content }));

        last_response = Some(response);
    }

    warn!(max_iterations, "tool loop hit maximum iterations");
    match last_response {
        Some(response) => Ok(ToolLoopOutcome { response, calls: all_calls }),
        None => Err(ProviderError::Parse(format!(
            "tool loop exceeded {max_iterations} iterations without a final response"
        ))),
    }
}

async fn execute_tool(tools: &[Box<dyn Tool>], call: &ToolCall) -> ToolResult {
    match tools.iter().find(|t| t.name() == call.name) {
        Some(tool) => {
            debug!(tool = %call.name, "executing tool");
            tool.execute(call.input.clone()).await
        }
        None => ToolResult::error(format!("unknown tool: {}", call.name)),
    }
}

/// Replace `result.content` with a `ref://` reference form if it exceeds
/// `max_chars`, storing the full text in `tool_output_store` first. Falls
/// back to plain truncation if the store write itself fails.
fn offload_if_oversized(
    tool_output_store: &ToolOutputStore,
    max_chars: usize,
    session_key: &str,
    tool_name: &str,
    result: ToolResult,
) -> ToolResult {
    if result.content.chars().count() <= max_chars {
        return result;
    }
    let summary: String = result.content.chars().take(160).collect();
    match tool_output_store.store(tool_name, &result.content, &summary, session_key) {
        Ok(stored) => ToolResult { content: stored.reference(), is_error: result.is_error },
        Err(e) => {
            warn!(error = %e, tool = tool_name, "failed to offload oversized tool output, truncating instead");
            let mut content: String = result.content.chars().take(max_chars).collect();
            content.push_str("...[truncated]");
            ToolResult { content, is_error: result.is_error }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, Message, Role};

    struct EchoTool;
    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, input: serde_json::Value) -> ToolResult {
            ToolResult::success(input.to_string())
        }
    }

    struct AllowAll;
    #[async_trait]
    impl ActionGate for AllowAll {
        async fn check(&self, _tool_name: &str, _input: &serde_json::Value) -> Option<String> {
            None
        }
    }

    struct DenyAll;
    #[async_trait]
    impl ActionGate for DenyAll {
        async fn check(&self, _tool_name: &str, _input: &serde_json::Value) -> Option<String> {
            Some("no side effects allowed".to_string())
        }
    }

    struct ScriptedProvider {
        responses: std::sync::Mutex<Vec<ChatResponse>>,
    }
    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(self.responses.lock().unwrap().remove(0))
        }
    }

    fn base_request() -> ChatRequest {
        ChatRequest {
            model: "test".into(),
            system: "sys".into(),
            messages: vec![Message { role: Role::User, content: "hi".into() }],
            max_tokens: 64,
            tools: Vec::new(),
            raw_messages: None,
        }
    }

    fn tool_output_store() -> ToolOutputStore {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        roster_worklog::db::init_tool_outputs_db(&conn).unwrap();
        ToolOutputStore::new(conn)
    }

    #[tokio::test]
    async fn stops_when_no_tool_calls() {
        let provider = ScriptedProvider {
            responses: std::sync::Mutex::new(vec![ChatResponse {
                content: "done".into(),
                model: "test".into(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "stop".into(),
                tool_calls: Vec::new(),
            }]),
        };
        let store = tool_output_store();
        let outcome = run_tool_loop(&provider, base_request(), &[], &AllowAll, 25, &store, 4000, "cli:u1")
            .await
            .unwrap();
        assert_eq!(outcome.response.content, "done");
        assert!(outcome.calls.is_empty());
    }

    #[tokio::test]
    async fn blocked_action_short_circuits_execution() {
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];
        let provider = ScriptedProvider {
            responses: std::sync::Mutex::new(vec![
                ChatResponse {
                    content: String::new(),
                    model: "test".into(),
                    tokens_in: 1,
                    tokens_out: 1,
                    stop_reason: "tool_use".into(),
                    tool_calls: vec![crate::provider::ToolCall {
                        id: "call1".into(),
                        name: "echo".into(),
                        input: serde_json::json!({"x": 1}),
                    }],
                },
                ChatResponse {
                    content: "acknowledged".into(),
                    model: "test".into(),
                    tokens_in: 1,
                    tokens_out: 1,
                    stop_reason: "stop".into(),
                    tool_calls: Vec::new(),
                },
            ]),
        };
        let store = tool_output_store();
        let outcome = run_tool_loop(&provider, base_request(), &tools, &DenyAll, 25, &store, 4000, "cli:u1")
            .await
            .unwrap();
        assert_eq!(outcome.calls.len(), 1);
        assert!(outcome.calls[0].result.is_error);
        assert!(outcome.calls[0].result.content.contains("blocked by role card"));
    }

    #[tokio::test]
    async fn max_iterations_returns_last_response_without_error() {
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];
        let looping_response = || ChatResponse {
            content: String::new(),
            model: "test".into(),
            tokens_in: 1,
            tokens_out: 1,
            stop_reason: "tool_use".into(),
            tool_calls: vec![crate::provider::ToolCall {
                id: "call1".into(),
                name: "echo".into(),
                input: serde_json::json!({}),
            }],
        };
        let provider = ScriptedProvider { responses: std::sync::Mutex::new(vec![looping_response(), looping_response()]) };
        let store = tool_output_store();
        let outcome = run_tool_loop(&provider, base_request(), &tools, &AllowAll, 2, &store, 4000, "cli:u1")
            .await
            .unwrap();
        assert_eq!(outcome.response.stop_reason, "tool_use");
    }

    struct HugeOutputTool;
    #[async_trait]
    impl Tool for HugeOutputTool {
        fn name(&self) -> &str {
            "shell"
        }
        fn description(&self) -> &str {
            "runs a shell command"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _input: serde_json::Value) -> ToolResult {
            ToolResult::success("x".repeat(45_000))
        }
    }

    #[tokio::test]
    async fn oversized_tool_output_is_replaced_with_a_reference() {
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(HugeOutputTool)];
        let provider = ScriptedProvider {
            responses: std::sync::Mutex::new(vec![
                ChatResponse {
                    content: String::new(),
                    model: "test".into(),
                    tokens_in: 1,
                    tokens_out: 1,
                    stop_reason: "tool_use".into(),
                    tool_calls: vec![crate::provider::ToolCall {
                        id: "call1".into(),
                        name: "shell".into(),
                        input: serde_json::json!({}),
                    }],
                },
                ChatResponse {
                    content: "ran it".into(),
                    model: "test".into(),
                    tokens_in: 1,
                    tokens_out: 1,
                    stop_reason: "stop".into(),
                    tool_calls: Vec::new(),
                },
            ]),
        };
        let store = tool_output_store();
        let outcome = run_tool_loop(&provider, base_request(), &tools, &AllowAll, 25, &store, 2000, "cli:u1")
            .await
            .unwrap();
        let content = &outcome.calls[0].result.content;
        assert!(content.len() < 200);
        assert!(content.starts_with("[shell output too large to inline"));
        assert!(content.contains("ref://"));
    }
}
