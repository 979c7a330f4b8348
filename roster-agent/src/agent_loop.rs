//! Per-bot turn processing (§4.9): the procedure that ties sanitize, session
//! history, memory recall, context assembly, routing, the tool loop, role
//! card enforcement, compaction, and persistence together for one inbound
//! message.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use roster_core::config::{AgentConfig, EnhancedContextConfig, SessionCompactionConfig, ToolOutputConfig};
use roster_core::ChannelKey;
use roster_memory::MemoryStore;
use roster_rolecard::Enforcer as RoleCardEnforcer;
use roster_sessions::{Compactor, MessageRole, NewMessage, SessionManager};
use roster_worklog::{LogLevel, NewLogEntry, SessionHandle, ToolOutputStore, WorkLog};

use crate::context::ContextAssembler;
use crate::error::{AgentError, Result};
use crate::provider::{ChatRequest, ChatResponse, Embedder, ModelProvider, ProviderError, TokenCounter};
use crate::router::{Router, Tier};
use crate::sanitize::Sanitizer;
use crate::tools::{ActionGate, Tool, ToolLoopOutcome};

/// Everything one bot needs to process a turn. Built once at startup per bot
/// and shared across turns via `Arc` — no module-level singletons (Design
/// Notes).
pub struct AgentLoop {
    pub bot_name: String,
    pub sessions: Arc<SessionManager>,
    pub memory: Arc<MemoryStore>,
    pub worklog: Arc<WorkLog>,
    pub tool_outputs: Arc<ToolOutputStore>,
    pub enforcer: Arc<RoleCardEnforcer>,
    pub embedder: Arc<dyn Embedder>,
    pub counter: Arc<dyn TokenCounter>,
    pub providers: HashMap<Tier, Arc<dyn ModelProvider>>,
    pub tools: Vec<Box<dyn Tool>>,
    pub compactor: Arc<Compactor>,
    pub agent_config: AgentConfig,
    pub context_config: EnhancedContextConfig,
    pub compaction_config: SessionCompactionConfig,
    pub tool_output_config: ToolOutputConfig,
    pub base_system_prompt: String,
}

/// Final outcome of one processed turn.
pub struct TurnOutcome {
    pub reply: String,
    pub tier: Tier,
    pub tokens_used: u32,
    pub escalated: bool,
}

struct RoleCardGate {
    enforcer: Arc<RoleCardEnforcer>,
    bot_name: String,
}

#[async_trait]
impl ActionGate for RoleCardGate {
    async fn check(&self, tool_name: &str, input: &serde_json::Value) -> Option<String> {
        let description = format!("{tool_name} {input}");
        match self.enforcer.check_action(&self.bot_name, &description) {
            Ok((true, _)) => None,
            Ok((false, reason)) => Some(reason.unwrap_or_else(|| "blocked by role card".to_string())),
            Err(e) => {
                warn!(error = %e, "role card check failed, denying by default");
                Some(format!("role card check failed: {e}"))
            }
        }
    }
}

/// Wraps a [`ModelProvider`] with exponential-backoff retry (§4.9 "Model
/// provider failures: retry with exponential backoff up to a small bounded
/// attempt count").
struct RetryingProvider {
    inner: Arc<dyn ModelProvider>,
    attempts: u32,
    backoff_ms: u64,
}

#[async_trait]
impl ModelProvider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
        let mut last_err = None;
        for attempt in 0..self.attempts.max(1) {
            match self.inner.send(req).await {
                Ok(resp) => return Ok(resp),
                Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
                Err(e) => {
                    warn!(attempt, error = %e, "provider call failed, retrying");
                    last_err = Some(e);
                    let delay = self.backoff_ms * 2u64.pow(attempt);
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
            }
        }
        Err(last_err.unwrap_or(ProviderError::Unavailable("no attempts made".to_string())))
    }
}

impl AgentLoop {
    /// Process one inbound turn end to end (§4.9 steps 1-9).
    #[instrument(skip(self, content), fields(bot = %self.bot_name, channel, chat_id))]
    pub async fn handle_turn(&self, channel: &str, chat_id: &str, sender: &str, content: &str) -> Result<TurnOutcome> {
        // Step 1: sanitize inbound content before it reaches any model or store.
        let sanitizer = Sanitizer::new(&self.agent_config.secret_mask_patterns);
        let clean_content = sanitizer.mask(content);

        let key = ChannelKey::new(channel, chat_id);
        let handle = self.worklog.start_session(&key.format(), &clean_content, None, false, &[self.bot_name.clone()])?;

        // Step 2: session fetch.
        self.sessions.get_or_create(&key)?;
        self.sessions.append_messages(
            &key,
            &[NewMessage::new(MessageRole::User, clean_content.clone(), sender)],
        )?;
        let history = self.sessions.get_messages(&key)?;

        // Step 3: memory recall.
        let query_embedding = self
            .embedder
            .embed(&clean_content)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "embedding failed, recalling without a query vector");
                vec![0.0; self.embedder.dimension()]
            });
        let recall = self
            .memory
            .recall(&query_embedding, self.agent_config.memory_recall_k, 0.5, Some(channel))?;

        // Step 4: context assembly.
        let assembler = ContextAssembler::new(&self.context_config);
        let assembled = assembler.assemble(&self.base_system_prompt, &recall, &history, self.counter.as_ref());
        if assembled.near_limit {
            warn!(used = assembled.used_tokens, budget = assembled.budget.total, "context nearing limit");
        }

        // Step 5: routing.
        let confirm_provider = self
            .providers
            .get(&Tier::Simple)
            .cloned()
            .ok_or_else(|| AgentError::Provider(ProviderError::Unavailable("no simple-tier provider configured".to_string())))?;
        let router = Router::new(0.7, confirm_provider.name());
        let tier = router.select(&clean_content, confirm_provider.as_ref()).await;
        let provider = self
            .providers
            .get(&tier)
            .cloned()
            .ok_or_else(|| AgentError::Provider(ProviderError::Unavailable(format!("no provider configured for tier {tier:?}"))))?;
        let retrying_provider = RetryingProvider {
            inner: provider,
            attempts: self.agent_config.provider_retry_attempts,
            backoff_ms: self.agent_config.provider_retry_backoff_ms,
        };

        // Step 6: tool loop, gated by the role card on every call.
        let gate = RoleCardGate { enforcer: Arc::clone(&self.enforcer), bot_name: self.bot_name.clone() };
        let request = ChatRequest {
            model: retrying_provider.name().to_string(),
            system: assembled.system_prompt.clone(),
            messages: assembled.messages.clone(),
            max_tokens: self.agent_config.max_tokens,
            tools: self.tools.iter().map(|t| crate::provider::ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            }).collect(),
            raw_messages: None,
        };
        let max_tool_output_chars =
            if self.tool_output_config.enabled { self.tool_output_config.max_tool_output_chars } else { usize::MAX };
        let outcome = crate::tools::run_tool_loop(
            &retrying_provider,
            request,
            &self.tools,
            &gate,
            self.agent_config.max_iterations,
            &self.tool_outputs,
            max_tool_output_chars,
            &key.format(),
        )
        .await
        .map_err(AgentError::Provider)?;

        self.log_tool_calls(&handle, &outcome);

        // Step 7: persist the assistant's turn (and any tool pairs) before compaction.
        self.persist_turn(&key, &outcome)?;

        // Step 8: compaction check, fire-and-forget so the turn's reply isn't delayed by it.
        if assembled.should_compact {
            self.spawn_compaction(key.clone());
        }

        // Step 9: escalation + emit.
        let (escalate, reason) = self
            .enforcer
            .should_escalate(&self.bot_name, &clean_content, estimate_confidence(&outcome.response))?;
        if escalate {
            self.worklog.log(
                &handle,
                LogLevel::Uncertainty,
                &reason,
                &self.bot_name,
                NewLogEntry { category: "escalation".to_string(), escalation: true, ..Default::default() },
            );
        }

        self.sessions.update_stats(&key, (outcome.response.tokens_in + outcome.response.tokens_out) as u64, &outcome.response.model)?;
        self.worklog.end_session(&handle, &outcome.response.content, 0.85)?;

        info!(tier = ?tier, tokens = outcome.response.tokens_out, "turn complete");
        Ok(TurnOutcome {
            reply: outcome.response.content,
            tier,
            tokens_used: outcome.response.tokens_in + outcome.response.tokens_out,
            escalated: escalate,
        })
    }

    fn log_tool_calls(&self, handle: &SessionHandle, outcome: &ToolLoopOutcome) {
        for executed in &outcome.calls {
            self.worklog.log(
                handle,
                if executed.result.is_error { LogLevel::Error } else { LogLevel::Tool },
                &executed.result.content,
                &self.bot_name,
                NewLogEntry {
                    category: "tool".to_string(),
                    tool_name: Some(executed.call.name.clone()),
                    tool_input: Some(executed.call.input.clone()),
                    tool_output: Some(executed.result.content.clone()),
                    tool_status: Some(if executed.result.is_error { "error" } else { "ok" }.to_string()),
                    ..Default::default()
                },
            );
        }
    }

    fn persist_turn(&self, key: &ChannelKey, outcome: &ToolLoopOutcome) -> Result<()> {
        let mut new_messages = Vec::new();
        for executed in &outcome.calls {
            new_messages.push(
                NewMessage::new(MessageRole::ToolUse, executed.call.input.to_string(), &self.bot_name)
                    .with_tool_call_id(executed.call.id.clone()),
            );
            new_messages.push(
                NewMessage::new(MessageRole::ToolResult, executed.result.content.clone(), &self.bot_name)
                    .with_tool_call_id(executed.call.id.clone()),
            );
        }
        new_messages.push(NewMessage::new(MessageRole::Assistant, outcome.response.content.clone(), &self.bot_name));
        self.sessions.append_messages(key, &new_messages)?;
        Ok(())
    }

    fn spawn_compaction(&self, key: ChannelKey) {
        let sessions = Arc::clone(&self.sessions);
        let compactor = Arc::clone(&self.compactor);
        let config = self.compaction_config.clone();
        tokio::spawn(async move {
            match compactor.compact(&sessions, &key, &config).await {
                Ok(report) if report.ran => info!(key = %key, dropped = report.messages_dropped, "background compaction ran"),
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "background compaction failed"),
            }
        });
    }
}

/// Confidence proxy for `should_escalate` when the provider doesn't report
/// one explicitly: a short, hedging response signals lower confidence.
fn estimate_confidence(response: &ChatResponse) -> f64 {
    let hedging_markers = ["i'm not sure", "i think", "might be", "possibly", "uncertain"];
    let lower = response.content.to_lowercase();
    if hedging_markers.iter().any(|m| lower.contains(m)) {
        0.4
    } else {
        0.85
    }
}
