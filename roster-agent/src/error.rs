use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("session error: {0}")]
    Session(#[from] roster_sessions::SessionError),

    #[error("memory error: {0}")]
    Memory(#[from] roster_memory::MemoryError),

    #[error("role card error: {0}")]
    RoleCard(#[from] roster_rolecard::RoleCardError),

    #[error("work log error: {0}")]
    WorkLog(#[from] roster_worklog::WorkLogError),

    #[error("tool loop exceeded {0} iterations without a final response")]
    IterationsExhausted(usize),
}

pub type Result<T> = std::result::Result<T, AgentError>;
