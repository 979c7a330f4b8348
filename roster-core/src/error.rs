use thiserror::Error;

/// Top-level error used only by the CLI binary's entry points.
///
/// Components (roster-sessions, roster-memory, ...) each define their own
/// narrow error enum and are not required to route through this type — see
/// SPEC_FULL.md §7: "all component interfaces return result-like values;
/// only the top-level CLI entry points translate errors to exit codes."
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("input validation error: {0}")]
    InputValidation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl RosterError {
    /// CLI exit code per SPEC_FULL.md §6: 0 success, 1 generic, 2 input, 3 not found.
    pub fn exit_code(&self) -> i32 {
        match self {
            RosterError::Config(_) => 1,
            RosterError::InputValidation(_) => 2,
            RosterError::NotFound(_) => 3,
            RosterError::Other(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
