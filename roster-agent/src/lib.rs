pub mod agent_loop;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod invoker;
pub mod provider;
pub mod router;
pub mod sanitize;
pub mod tools;

pub use agent_loop::{AgentLoop, TurnOutcome};
pub use context::{AssembledContext, Budget, ContextAssembler};
pub use dispatcher::{dispatch, parse_mentions, Dispatch, TargetKind};
pub use error::{AgentError, Result};
pub use invoker::{is_invocation_result, BotInvoker, BotTask};
pub use provider::{
    ChatRequest, ChatResponse, Embedder, Message, ModelProvider, ProviderError, Role, ToolCall, ToolDefinition, TokenCounter,
};
pub use router::{Classification, Router, Tier, TierClassifier};
pub use sanitize::{default_patterns, Sanitizer};
pub use tools::{ActionGate, ExecutedCall, Tool, ToolLoopOutcome, ToolResult};
