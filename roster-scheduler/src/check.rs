use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome status of one check execution (§3 CheckResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    Timeout,
}

/// The record of one check's execution within a HeartbeatTick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_name: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub status: CheckStatus,
    pub success: bool,
    pub message: String,
    pub data: serde_json::Value,
    pub error: Option<String>,
    pub error_type: Option<String>,
    pub action_taken: Option<String>,
    pub duration_ms: u64,
}

/// What a check handler returns on a successful (non-timeout, non-panicking) run.
pub struct CheckOutcome {
    pub success: bool,
    pub message: String,
    pub data: serde_json::Value,
    pub action_taken: Option<String>,
}

impl CheckOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: serde_json::Value::Null,
            action_taken: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: serde_json::Value::Null,
            action_taken: None,
        }
    }
}

/// A named, schedulable unit of autonomous work a bot performs on its
/// heartbeat (§4.6 CheckRegistry). Implementors must be cheap to hold
/// behind an `Arc` and safe to call concurrently.
#[async_trait]
pub trait CheckHandler: Send + Sync {
    async fn run(&self, bot: &str, config: &serde_json::Value) -> CheckOutcome;
}

/// Registration metadata for one check.
pub struct CheckDefinition {
    pub name: String,
    pub description: String,
    /// Lower value = earlier execution in sequential mode; ties broken by
    /// registration order.
    pub priority: i32,
    pub default_timeout_ms: u64,
    /// `["all"]` makes the check visible from every bot's registry view;
    /// otherwise only bots named here see it (§8 boundary behavior).
    pub bot_domains: Vec<String>,
    pub config: serde_json::Value,
    pub handler: std::sync::Arc<dyn CheckHandler>,
}

impl CheckDefinition {
    pub fn visible_to(&self, bot: &str) -> bool {
        self.bot_domains.iter().any(|d| d == "all" || d == bot)
    }
}
