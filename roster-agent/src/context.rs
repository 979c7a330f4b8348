//! Context window assembly and truncation-priority accounting (§4.4).
//!
//! Budget is split by percentage across three pools — system, memory,
//! history — out of `max_context_tokens - response_buffer`. When the
//! conversation grows past `compaction_threshold`, the caller (AgentLoop)
//! should trigger a `roster_sessions::Compactor` pass; this module only
//! reports the signal, it doesn't compact anything itself.

use std::collections::HashSet;

use roster_core::config::EnhancedContextConfig;
use roster_memory::RecallResult;
use roster_sessions::{Message as SessionMessage, MessageRole};

use crate::provider::{Message, Role};

/// Token budget split, computed once per assembly call.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub total: u32,
    pub system: u32,
    pub memory: u32,
    pub history: u32,
}

/// Outcome of assembling a request's context: the messages to send plus
/// whether the caller should warn or trigger compaction.
pub struct AssembledContext {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub used_tokens: u32,
    pub budget: Budget,
    pub near_limit: bool,
    pub should_compact: bool,
}

/// Builds a bounded conversation window from session history, recalled
/// memory, and a base system prompt, honoring §4.4's budget percentages and
/// truncation priority (oldest history trimmed first; user-preference
/// summary preserved last if `preserve_user_preferences` is set).
pub struct ContextAssembler<'a> {
    config: &'a EnhancedContextConfig,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(config: &'a EnhancedContextConfig) -> Self {
        Self { config }
    }

    pub fn budget(&self) -> Budget {
        let available = self.config.max_context_tokens.saturating_sub(self.config.response_buffer);
        Budget {
            total: available,
            system: (available as f64 * self.config.system_budget_percent) as u32,
            memory: (available as f64 * self.config.memory_budget_percent) as u32,
            history: (available as f64 * self.config.history_budget_percent) as u32,
        }
    }

    /// Assembles the final message list for a request. `history` is ordered
    /// oldest-first; `counter` estimates token cost for budget accounting.
    pub fn assemble(
        &self,
        base_system_prompt: &str,
        recall: &RecallResult,
        history: &[SessionMessage],
        counter: &dyn crate::provider::TokenCounter,
    ) -> AssembledContext {
        let budget = self.budget();

        let memory_text = render_memory(recall, self.config.preserve_user_preferences);
        let memory_tokens = counter.count(&memory_text).min(budget.memory as usize) as u32;
        let trimmed_memory = if memory_text.is_empty() {
            memory_text
        } else {
            truncate_to_tokens(&memory_text, budget.memory, counter)
        };

        let system_prompt = if trimmed_memory.is_empty() {
            base_system_prompt.to_string()
        } else {
            format!("{base_system_prompt}\n\n# Recalled context\n{trimmed_memory}")
        };
        let system_tokens = counter.count(&system_prompt).min(budget.system.max(budget.memory) as usize) as u32;

        let mut messages = Vec::new();
        let mut history_tokens = 0u32;
        // Newest-first accumulation so the oldest messages are the ones
        // dropped when the history budget is exceeded. `pending_tool_results`
        // tracks `tool_result`s already included whose matching `tool_use`
        // (older, so seen later in this reverse walk) hasn't been included
        // yet — the budget cutoff is suspended until it resolves, so a pair
        // is never split across the truncation boundary.
        let mut pending_tool_results: HashSet<&str> = HashSet::new();
        for msg in history.iter().rev() {
            let cost = counter.count(&msg.content) as u32;
            let over_budget = history_tokens + cost > budget.history && messages.len() >= self.config.min_history_messages;
            if over_budget && pending_tool_results.is_empty() {
                break;
            }
            if let Some(id) = &msg.tool_call_id {
                match msg.role {
                    MessageRole::ToolResult => {
                        pending_tool_results.insert(id.as_str());
                    }
                    MessageRole::ToolUse => {
                        pending_tool_results.remove(id.as_str());
                    }
                    _ => {}
                }
            }
            messages.push(to_provider_message(msg));
            history_tokens += cost;
        }
        messages.reverse();

        let used_tokens = system_tokens + memory_tokens + history_tokens;
        let fraction_used = used_tokens as f64 / budget.total.max(1) as f64;

        AssembledContext {
            system_prompt,
            messages,
            used_tokens,
            budget,
            near_limit: fraction_used >= self.config.warning_threshold,
            should_compact: fraction_used >= self.config.compaction_threshold,
        }
    }
}

fn render_memory(recall: &RecallResult, preserve_user_preferences: bool) -> String {
    let mut parts = Vec::new();
    if preserve_user_preferences {
        if let Some(ref prefs) = recall.user_preferences {
            parts.push(format!("User preferences: {}", prefs.content));
        }
    }
    if let Some(ref summary) = recall.channel_summary {
        parts.push(format!("Channel summary: {}", summary.content));
    }
    for (entity, score) in &recall.entities {
        parts.push(format!("Entity ({score:.2}): {} — {}", entity.canonical_name, entity.entity_type));
    }
    for fact in &recall.facts {
        parts.push(format!("Fact: {} {} {}", fact.subject, fact.predicate, fact.object));
    }
    parts.join("\n")
}

fn truncate_to_tokens(text: &str, max_tokens: u32, counter: &dyn crate::provider::TokenCounter) -> String {
    if counter.count(text) as u32 <= max_tokens {
        return text.to_string();
    }
    let mut out = String::new();
    for line in text.lines() {
        let candidate = if out.is_empty() { line.to_string() } else { format!("{out}\n{line}") };
        if counter.count(&candidate) as u32 > max_tokens {
            break;
        }
        out = candidate;
    }
    out
}

fn to_provider_message(msg: &SessionMessage) -> Message {
    use roster_sessions::MessageRole;
    let role = match msg.role {
        MessageRole::User => Role::User,
        MessageRole::Assistant | MessageRole::ToolUse | MessageRole::ToolResult => Role::Assistant,
    };
    Message { role, content: msg.content.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::ChannelKey;
    use roster_sessions::MessageRole;

    struct CharCounter;
    impl crate::provider::TokenCounter for CharCounter {
        fn count(&self, text: &str) -> usize {
            text.len()
        }
    }

    fn msg(id: i64, role: MessageRole, content: &str) -> SessionMessage {
        SessionMessage {
            id,
            step_no: id,
            role,
            content: content.to_string(),
            tool_call_id: None,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            bot_name: "leader".to_string(),
        }
    }

    #[test]
    fn drops_oldest_history_first_when_over_budget() {
        let config = EnhancedContextConfig {
            max_context_tokens: 200,
            response_buffer: 0,
            memory_budget_percent: 0.1,
            history_budget_percent: 0.1,
            system_budget_percent: 0.1,
            warning_threshold: 0.8,
            compaction_threshold: 0.95,
            min_history_messages: 1,
            preserve_user_preferences: true,
        };
        let assembler = ContextAssembler::new(&config);
        let history = vec![
            msg(1, MessageRole::User, "first message, quite old"),
            msg(2, MessageRole::Assistant, "second message"),
            msg(3, MessageRole::User, "third and newest message"),
        ];
        let recall = RecallResult::default();
        let assembled = assembler.assemble("system", &recall, &history, &CharCounter);

        assert!(assembled.messages.len() < history.len());
        assert_eq!(assembled.messages.last().unwrap().content, "third and newest message");
    }

    #[test]
    fn flags_near_limit_and_should_compact() {
        let config = EnhancedContextConfig {
            max_context_tokens: 20,
            response_buffer: 0,
            memory_budget_percent: 0.0,
            history_budget_percent: 1.0,
            system_budget_percent: 0.0,
            warning_threshold: 0.5,
            compaction_threshold: 0.6,
            min_history_messages: 0,
            preserve_user_preferences: false,
        };
        let assembler = ContextAssembler::new(&config);
        let history = vec![msg(1, MessageRole::User, "12345678901234")];
        let recall = RecallResult::default();
        let assembled = assembler.assemble("", &recall, &history, &CharCounter);

        assert!(assembled.near_limit);
        assert!(assembled.should_compact);
    }

    #[test]
    fn never_splits_a_tool_pair_across_the_truncation_boundary() {
        let config = EnhancedContextConfig {
            max_context_tokens: 240,
            response_buffer: 0,
            memory_budget_percent: 0.1,
            history_budget_percent: 0.1,
            system_budget_percent: 0.1,
            warning_threshold: 0.8,
            compaction_threshold: 0.95,
            min_history_messages: 1,
            preserve_user_preferences: true,
        };
        let assembler = ContextAssembler::new(&config);
        let mut tool_use = msg(2, MessageRole::ToolUse, "search(old query)");
        tool_use.tool_call_id = Some("tc1".to_string());
        let mut tool_result = msg(3, MessageRole::ToolResult, "old result");
        tool_result.tool_call_id = Some("tc1".to_string());
        let history = vec![
            msg(1, MessageRole::User, "first message, quite old and irrelevant filler"),
            tool_use,
            tool_result,
            msg(4, MessageRole::User, "newest message"),
        ];
        let recall = RecallResult::default();
        let assembled = assembler.assemble("system", &recall, &history, &CharCounter);

        let has_tool_use = assembled.messages.iter().any(|m| m.content == "search(old query)");
        let has_tool_result = assembled.messages.iter().any(|m| m.content == "old result");
        assert_eq!(has_tool_use, has_tool_result, "tool_use and its tool_result must be kept or dropped together");
        assert!(has_tool_result, "the tool_result nearer the budget cutoff should pull its tool_use along with it");
    }

    #[test]
    fn includes_user_preferences_and_facts_when_present() {
        let _ = ChannelKey { channel: "cli".into(), chat_id: "room1".into() };
        let config = EnhancedContextConfig::default();
        let assembler = ContextAssembler::new(&config);
        let mut recall = RecallResult::default();
        recall.facts.push(roster_memory::Fact {
            id: "f1".into(),
            subject: "user".into(),
            predicate: "prefers".into(),
            object: "dark_mode".into(),
            confidence: 0.9,
            source: "user_feedback".into(),
        });
        let assembled = assembler.assemble("base prompt", &recall, &[], &CharCounter);
        assert!(assembled.system_prompt.contains("dark_mode"));
    }
}
