use serde::{Deserialize, Serialize};

use roster_core::ChannelKey;

/// Role of a [`Message`] within a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    ToolUse,
    ToolResult,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::ToolUse => "tool_use",
            Self::ToolResult => "tool_result",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool_use" => Ok(Self::ToolUse),
            "tool_result" => Ok(Self::ToolResult),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a [`Session`].
///
/// Invariant (§3): every `tool_result` message has a `tool_use` message with
/// the same `tool_call_id` earlier in the same session. This invariant must
/// survive compaction — see [`crate::compactor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub step_no: i64,
    pub role: MessageRole,
    pub content: String,
    pub tool_call_id: Option<String>,
    pub timestamp: String,
    pub bot_name: String,
}

/// A persisted conversation keyed by `(channel, chat_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// UUIDv7 primary key — time-sortable.
    pub id: String,
    pub key: ChannelKey,
    pub message_count: u32,
    pub total_tokens: u64,
    pub last_model: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
