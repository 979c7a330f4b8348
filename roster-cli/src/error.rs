//! Top-level CLI error type (§7 "the CLI binary's top-level error type
//! aggregates via `#[from]` and maps to the exit codes in §6").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] roster_core::RosterError),

    #[error(transparent)]
    Session(#[from] roster_sessions::SessionError),

    #[error(transparent)]
    Memory(#[from] roster_memory::MemoryError),

    #[error(transparent)]
    RoleCard(#[from] roster_rolecard::RoleCardError),

    #[error(transparent)]
    WorkLog(#[from] roster_worklog::WorkLogError),

    #[error(transparent)]
    Scheduler(#[from] roster_scheduler::SchedulerError),

    #[error(transparent)]
    LearningExchange(#[from] roster_learning::LearningExchangeError),

    #[error(transparent)]
    Agent(#[from] roster_agent::AgentError),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// 0 success, 1 generic error, 2 user input error, 3 not found (§6).
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Session(roster_sessions::SessionError::NotFound { .. }) => 3,
            CliError::RoleCard(roster_rolecard::RoleCardError::NotFound(_)) => 3,
            CliError::WorkLog(roster_worklog::WorkLogError::NotFound(_)) => 3,
            CliError::Scheduler(roster_scheduler::SchedulerError::JobNotFound { .. }) => 3,
            CliError::Scheduler(roster_scheduler::SchedulerError::CheckNotFound(_)) => 3,
            CliError::LearningExchange(roster_learning::LearningExchangeError::NotFound(_)) => 3,
            CliError::Memory(roster_memory::MemoryError::NotFound(_)) => 3,
            CliError::Config(e) => e.exit_code(),
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
