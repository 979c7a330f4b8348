use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use roster_core::config::{CompactionMode, EmergencyCompactionConfig, SessionCompactionConfig};
use roster_core::ChannelKey;

use crate::error::Result;
use crate::manager::SessionManager;
use crate::types::{Message, MessageRole};

/// External capability used to turn a chunk of messages into one summary
/// string. Implemented by `roster-agent` against a `ModelProvider`; kept as a
/// trait here so `roster-sessions` has no dependency on the agent crate.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, chunk: &[Message]) -> String;
}

/// Outcome of a single compaction pass.
#[derive(Debug, Clone, Default)]
pub struct CompactionReport {
    pub messages_dropped: usize,
    pub ran: bool,
}

pub struct Compactor {
    summarizer: Arc<dyn Summarizer>,
}

impl Compactor {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self { summarizer }
    }

    /// Run a compaction pass per §4.4. `preserve_recent` messages (at least)
    /// remain verbatim; the cut point is always pushed back to the nearest
    /// safe boundary so the tool_use/tool_result pairing invariant survives.
    pub async fn compact(
        &self,
        sessions: &SessionManager,
        key: &ChannelKey,
        config: &SessionCompactionConfig,
    ) -> Result<CompactionReport> {
        if matches!(config.mode, CompactionMode::Off) || !config.enabled {
            return Ok(CompactionReport::default());
        }

        let messages = sessions.get_messages(key)?;
        if messages.len() <= config.min_messages {
            return Ok(CompactionReport::default());
        }

        let target_idx = messages.len().saturating_sub(config.preserve_recent);
        let boundary = safe_boundary_at_or_before(&messages, target_idx);
        if boundary == 0 {
            warn!(key = %key, "no safe compaction boundary found, skipping");
            return Ok(CompactionReport::default());
        }

        match config.mode {
            CompactionMode::TokenLimit => {
                let rowcount = sessions.compact_prefix(key, &messages, boundary, None)?;
                Ok(CompactionReport {
                    messages_dropped: rowcount,
                    ran: rowcount > 0,
                })
            }
            CompactionMode::Summary => {
                let prefix = &messages[..boundary];
                let mut summaries = Vec::new();
                for chunk in prefix.chunks(config.summary_chunk_size.max(1)) {
                    summaries.push(self.summarizer.summarize(chunk).await);
                }
                let combined = summaries.join("\n");
                let rowcount =
                    sessions.compact_prefix(key, &messages, boundary, Some((&combined, "system")))?;
                info!(key = %key, dropped = rowcount, "session compacted via summary");
                Ok(CompactionReport {
                    messages_dropped: rowcount,
                    ran: true,
                })
            }
            CompactionMode::Off => unreachable!(),
        }
    }

    /// Emergency compaction at the 0.95 threshold (§4.4): caps tool output
    /// length, drops very short messages, collapses consecutive identical
    /// tool calls, but always preserves the last `preserve_count` messages
    /// verbatim and never orphans a `tool_result`.
    pub fn emergency_compact(
        &self,
        sessions: &SessionManager,
        key: &ChannelKey,
        config: &EmergencyCompactionConfig,
    ) -> Result<CompactionReport> {
        if !config.enabled {
            return Ok(CompactionReport::default());
        }
        let messages = sessions.get_messages(key)?;
        let preserve_from = messages.len().saturating_sub(config.preserve_count);
        let boundary = safe_boundary_at_or_before(&messages, preserve_from);
        if boundary == 0 {
            return Ok(CompactionReport::default());
        }

        let trimmed = collapse_and_trim(&messages[..boundary], config);
        let dropped = sessions.replace_prefix_verbatim(key, &messages, boundary, trimmed)?;
        Ok(CompactionReport {
            messages_dropped: dropped,
            ran: dropped > 0,
        })
    }
}

/// Drop consecutive duplicate tool_use/tool_result pairs and short
/// user/assistant messages, capping every remaining tool_result's content.
fn collapse_and_trim(messages: &[Message], config: &EmergencyCompactionConfig) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    for m in messages {
        if matches!(m.role, MessageRole::User | MessageRole::Assistant)
            && m.content.len() < config.min_message_length
        {
            continue;
        }
        if let Some(last) = out.last() {
            let is_dup_tool_call = matches!(m.role, MessageRole::ToolUse | MessageRole::ToolResult)
                && last.role == m.role
                && last.content == m.content;
            if is_dup_tool_call {
                continue;
            }
        }
        let mut m = m.clone();
        if matches!(m.role, MessageRole::ToolResult) && m.content.len() > config.max_tool_output_emergency {
            m.content.truncate(config.max_tool_output_emergency);
            m.content.push_str("...[truncated]");
        }
        out.push(m);
    }
    out
}

/// Return the nearest safe boundary index `<= target` such that
/// `messages[0..boundary]` contains every `tool_use` whose matching
/// `tool_result` also lies in `messages[0..boundary]` — cutting there can
/// never orphan a pair in the suffix that survives.
fn safe_boundary_at_or_before(messages: &[Message], target: usize) -> usize {
    let target = target.min(messages.len());
    let mut pending: HashSet<String> = HashSet::new();
    let mut last_safe = 0;
    for (idx, m) in messages.iter().enumerate() {
        match m.role {
            MessageRole::ToolUse => {
                if let Some(id) = &m.tool_call_id {
                    pending.insert(id.clone());
                }
            }
            MessageRole::ToolResult => {
                if let Some(id) = &m.tool_call_id {
                    pending.remove(id);
                }
            }
            _ => {}
        }
        if pending.is_empty() {
            let boundary = idx + 1;
            if boundary <= target {
                last_safe = boundary;
            } else {
                break;
            }
        }
    }
    last_safe
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: MessageRole, content: &str, tool_call_id: Option<&str>) -> Message {
        Message {
            id: 0,
            step_no: 0,
            role,
            content: content.to_string(),
            tool_call_id: tool_call_id.map(String::from),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            bot_name: "leader".to_string(),
        }
    }

    #[test]
    fn boundary_never_splits_a_tool_pair() {
        let messages = vec![
            msg(MessageRole::User, "hi", None),
            msg(MessageRole::Assistant, "calling tool", None),
            msg(MessageRole::ToolUse, "call", Some("tc1")),
            msg(MessageRole::ToolResult, "result", Some("tc1")),
            msg(MessageRole::Assistant, "done", None),
        ];
        // target of 3 falls inside the tool_use/tool_result pair (index 2,3);
        // the safe boundary must back off to 2 (before the pair starts).
        assert_eq!(safe_boundary_at_or_before(&messages, 3), 2);
        assert_eq!(safe_boundary_at_or_before(&messages, 4), 4);
    }

    #[test]
    fn boundary_at_zero_when_first_pair_unresolved() {
        let messages = vec![
            msg(MessageRole::ToolUse, "call", Some("tc1")),
            msg(MessageRole::ToolResult, "result", Some("tc2")),
        ];
        assert_eq!(safe_boundary_at_or_before(&messages, 1), 0);
    }
}
