use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RosterError};

pub const DEFAULT_MAX_ITERATIONS: usize = 25;
pub const DEFAULT_PROMOTION_THRESHOLD: f64 = 0.85;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Top-level config (`roster.toml` + `ROSTER_*` env overrides), SPEC_FULL.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub learning_exchange: LearningExchangeConfig,
    #[serde(default)]
    pub heartbeat: std::collections::HashMap<String, HeartbeatConfig>,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub session_compaction: SessionCompactionConfig,
    #[serde(default)]
    pub enhanced_context: EnhancedContextConfig,
    #[serde(default)]
    pub tool_output: ToolOutputConfig,
    #[serde(default)]
    pub emergency_compaction: EmergencyCompactionConfig,
    #[serde(default)]
    pub workspace: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            memory: MemoryConfig::default(),
            learning_exchange: LearningExchangeConfig::default(),
            heartbeat: std::collections::HashMap::new(),
            agent: AgentConfig::default(),
            session_compaction: SessionCompactionConfig::default(),
            enhanced_context: EnhancedContextConfig::default(),
            tool_output: ToolOutputConfig::default(),
            emergency_compaction: EmergencyCompactionConfig::default(),
            workspace: default_workspace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Mirrors SPEC_FULL.md §6 `memory.session_compaction` / `memory.enhanced_context`
/// / `memory.tool_output_config` / `memory.emergency_compaction` keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub session_compaction: SessionCompactionConfig,
    #[serde(default)]
    pub enhanced_context: EnhancedContextConfig,
    #[serde(default)]
    pub tool_output: ToolOutputConfig,
    #[serde(default)]
    pub emergency_compaction: EmergencyCompactionConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            session_compaction: SessionCompactionConfig::default(),
            enhanced_context: EnhancedContextConfig::default(),
            tool_output: ToolOutputConfig::default(),
            emergency_compaction: EmergencyCompactionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionMode {
    Summary,
    TokenLimit,
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCompactionConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_mode")]
    pub mode: CompactionMode,
    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: f64,
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_preserve_recent")]
    pub preserve_recent: usize,
    #[serde(default = "bool_true")]
    pub preserve_tool_chains: bool,
    #[serde(default = "default_chunk_size")]
    pub summary_chunk_size: usize,
    #[serde(default = "bool_true")]
    pub enable_memory_flush: bool,
}

impl Default for SessionCompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: CompactionMode::Summary,
            threshold_percent: default_threshold_percent(),
            min_messages: default_min_messages(),
            max_messages: default_max_messages(),
            preserve_recent: default_preserve_recent(),
            preserve_tool_chains: true,
            summary_chunk_size: default_chunk_size(),
            enable_memory_flush: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedContextConfig {
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
    #[serde(default = "default_response_buffer")]
    pub response_buffer: u32,
    #[serde(default = "default_memory_pct")]
    pub memory_budget_percent: f64,
    #[serde(default = "default_history_pct")]
    pub history_budget_percent: f64,
    #[serde(default = "default_system_pct")]
    pub system_budget_percent: f64,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: f64,
    #[serde(default = "default_min_history_messages")]
    pub min_history_messages: usize,
    #[serde(default = "bool_true")]
    pub preserve_user_preferences: bool,
}

impl Default for EnhancedContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            response_buffer: default_response_buffer(),
            memory_budget_percent: default_memory_pct(),
            history_budget_percent: default_history_pct(),
            system_budget_percent: default_system_pct(),
            warning_threshold: default_warning_threshold(),
            compaction_threshold: default_compaction_threshold(),
            min_history_messages: default_min_history_messages(),
            preserve_user_preferences: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutputConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_max_tool_output_chars")]
    pub max_tool_output_chars: usize,
    #[serde(default = "bool_true")]
    pub store_full_output: bool,
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,
}

impl Default for ToolOutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tool_output_chars: default_max_tool_output_chars(),
            store_full_output: true,
            summarize_threshold: default_summarize_threshold(),
        }
    }
}

/// Per-bot AgentLoop tuning (§4.9) — tool loop bounds, provider retry policy,
/// and the secret-masking patterns applied to inbound content at intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_agent_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_agent_provider_retry_attempts")]
    pub provider_retry_attempts: u32,
    #[serde(default = "default_agent_provider_retry_backoff_ms")]
    pub provider_retry_backoff_ms: u64,
    #[serde(default = "default_agent_memory_recall_k")]
    pub memory_recall_k: usize,
    /// Regexes applied to inbound content before it reaches the model
    /// (e.g. API keys, tokens) — matches are replaced with `[redacted]`.
    #[serde(default)]
    pub secret_mask_patterns: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_agent_max_iterations(),
            max_tokens: default_agent_max_tokens(),
            provider_retry_attempts: default_agent_provider_retry_attempts(),
            provider_retry_backoff_ms: default_agent_provider_retry_backoff_ms(),
            memory_recall_k: default_agent_memory_recall_k(),
            secret_mask_patterns: Vec::new(),
        }
    }
}

fn default_agent_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}
fn default_agent_max_tokens() -> u32 {
    4096
}
fn default_agent_provider_retry_attempts() -> u32 {
    3
}
fn default_agent_provider_retry_backoff_ms() -> u64 {
    500
}
fn default_agent_memory_recall_k() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyCompactionConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,
    #[serde(default = "default_max_tool_output_emergency")]
    pub max_tool_output_emergency: usize,
    #[serde(default = "default_min_message_length")]
    pub min_message_length: usize,
    #[serde(default = "default_preserve_count")]
    pub preserve_count: usize,
}

impl Default for EmergencyCompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            critical_threshold: default_critical_threshold(),
            max_tool_output_emergency: default_max_tool_output_emergency(),
            min_message_length: default_min_message_length(),
            preserve_count: default_preserve_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningExchangeConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_min_confidence_promotion")]
    pub min_confidence: f64,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default = "default_shareable_categories")]
    pub shareable_categories: Vec<String>,
}

impl Default for LearningExchangeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: default_min_confidence_promotion(),
            auto_approve: true,
            shareable_categories: default_shareable_categories(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_interval_s")]
    pub interval_s: u64,
    #[serde(default = "default_max_execution_time_s")]
    pub max_execution_time_s: u64,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(default = "bool_true")]
    pub parallel_checks: bool,
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_s")]
    pub retry_delay_s: u64,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    #[serde(default = "default_circuit_breaker_timeout_s")]
    pub circuit_breaker_timeout_s: u64,
    #[serde(default)]
    pub stop_on_first_failure: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_s: default_interval_s(),
            max_execution_time_s: default_max_execution_time_s(),
            enabled: true,
            checks: Vec::new(),
            parallel_checks: true,
            max_concurrent_checks: default_max_concurrent_checks(),
            retry_attempts: default_retry_attempts(),
            retry_delay_s: default_retry_delay_s(),
            retry_backoff: default_retry_backoff(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_timeout_s: default_circuit_breaker_timeout_s(),
            stop_on_first_failure: false,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_mode() -> CompactionMode {
    CompactionMode::Summary
}
fn default_threshold_percent() -> f64 {
    0.8
}
fn default_min_messages() -> usize {
    10
}
fn default_max_messages() -> usize {
    200
}
fn default_preserve_recent() -> usize {
    20
}
fn default_chunk_size() -> usize {
    10
}
fn default_max_context_tokens() -> u32 {
    100_000
}
fn default_response_buffer() -> u32 {
    1000
}
fn default_memory_pct() -> f64 {
    0.35
}
fn default_history_pct() -> f64 {
    0.35
}
fn default_system_pct() -> f64 {
    0.20
}
fn default_warning_threshold() -> f64 {
    0.75
}
fn default_compaction_threshold() -> f64 {
    0.8
}
fn default_min_history_messages() -> usize {
    10
}
fn default_max_tool_output_chars() -> usize {
    2000
}
fn default_summarize_threshold() -> usize {
    2000
}
fn default_critical_threshold() -> f64 {
    0.95
}
fn default_max_tool_output_emergency() -> usize {
    200
}
fn default_min_message_length() -> usize {
    20
}
fn default_preserve_count() -> usize {
    6
}
fn default_min_confidence_promotion() -> f64 {
    DEFAULT_PROMOTION_THRESHOLD
}
fn default_shareable_categories() -> Vec<String> {
    vec![
        "user_preference",
        "tool_pattern",
        "error_pattern",
        "performance_tip",
        "context_tip",
        "workflow_tip",
        "reasoning_pattern",
        "integration_tip",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_interval_s() -> u64 {
    300
}
fn default_max_execution_time_s() -> u64 {
    120
}
fn default_max_concurrent_checks() -> usize {
    4
}
fn default_retry_attempts() -> u32 {
    2
}
fn default_retry_delay_s() -> u64 {
    5
}
fn default_retry_backoff() -> f64 {
    2.0
}
fn default_circuit_breaker_threshold() -> u32 {
    3
}
fn default_circuit_breaker_timeout_s() -> u64 {
    600
}
fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.roster")
}
fn default_workspace() -> String {
    "default".to_string()
}

impl RosterConfig {
    /// Load config from a TOML file with `ROSTER_*` env var overrides.
    ///
    /// Checks, in order: explicit path argument, `ROSTER_CONFIG_PATH`, then
    /// `~/.roster/roster.toml`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("ROSTER_CONFIG_PATH").ok())
            .unwrap_or_else(default_config_path);

        let config: RosterConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ROSTER_").split("_"))
            .extract()
            .map_err(|e| RosterError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.roster/roster.toml")
}
