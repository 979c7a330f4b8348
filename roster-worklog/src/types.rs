use serde::{Deserialize, Serialize};

/// Severity/kind of a [`LogEntry`] (§3 WorkLog.log_entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Thinking,
    Decision,
    Correction,
    Uncertainty,
    Warning,
    Error,
    Tool,
    Handoff,
    Coordination,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Thinking => "thinking",
            Self::Decision => "decision",
            Self::Correction => "correction",
            Self::Uncertainty => "uncertainty",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Tool => "tool",
            Self::Handoff => "handoff",
            Self::Coordination => "coordination",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "thinking" => Ok(Self::Thinking),
            "decision" => Ok(Self::Decision),
            "correction" => Ok(Self::Correction),
            "uncertainty" => Ok(Self::Uncertainty),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "tool" => Ok(Self::Tool),
            "handoff" => Ok(Self::Handoff),
            "coordination" => Ok(Self::Coordination),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handle returned by `start_session`, threaded through subsequent `log` calls.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub session_key: String,
    pub room_id: Option<String>,
    pub coordinator: bool,
}

/// `session_log` row (§3 WorkLog).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    pub id: String,
    pub session_key: String,
    pub query: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub room_id: Option<String>,
    pub coordinator: bool,
    pub participants: Vec<String>,
    pub final_output: Option<String>,
}

/// `log_entry` row (§3 WorkLog). Append-only; `step_no` is dense within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub session_id: String,
    pub step_no: i64,
    pub timestamp: String,
    pub level: LogLevel,
    pub category: String,
    pub bot_name: String,
    pub triggered_by: Option<String>,
    pub message: String,
    pub details_json: Option<serde_json::Value>,
    pub confidence: Option<f64>,
    pub duration_ms: Option<i64>,
    pub tool_name: Option<String>,
    pub tool_input: Option<serde_json::Value>,
    pub tool_output: Option<String>,
    pub tool_status: Option<String>,
    pub mentions: Vec<String>,
    pub response_to_step: Option<i64>,
    pub coordinator_mode: bool,
    pub escalation: bool,
    pub shareable: bool,
    pub insight_category: Option<String>,
}

/// Builder for a new [`LogEntry`] before its `id`/`step_no`/`timestamp` are assigned.
#[derive(Debug, Clone, Default)]
pub struct NewLogEntry {
    pub category: String,
    pub triggered_by: Option<String>,
    pub details_json: Option<serde_json::Value>,
    pub confidence: Option<f64>,
    pub duration_ms: Option<i64>,
    pub tool_name: Option<String>,
    pub tool_input: Option<serde_json::Value>,
    pub tool_output: Option<String>,
    pub tool_status: Option<String>,
    pub mentions: Vec<String>,
    pub response_to_step: Option<i64>,
    pub coordinator_mode: bool,
    pub escalation: bool,
    pub shareable: bool,
    pub insight_category: Option<String>,
}

/// Overflow storage for oversized tool output (§3/§4.4 "Tool output management").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub id: String,
    pub tool_name: String,
    pub full_output: String,
    pub context_summary: String,
    pub session_key: String,
    pub created_at: String,
    pub accessed_count: u64,
    pub char_count: usize,
}

impl ToolOutput {
    /// Stable, round-trippable reference form substituted into context in
    /// place of the raw output.
    pub fn reference(&self) -> String {
        format!(
            "[{} output too large to inline: {} chars captured — retrieve full output via ref://{}]",
            self.tool_name, self.char_count, self.id
        )
    }
}
