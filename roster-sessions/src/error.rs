use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {key}")]
    NotFound { key: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Returned by `compact_session` when the requested cut point would
    /// orphan a `tool_result` or strand a `tool_use` without its pairing
    /// `tool_result` (§3 Session invariant).
    #[error("compaction would violate the tool_use/tool_result pairing invariant")]
    WouldOrphanToolPair,
}

pub type Result<T> = std::result::Result<T, SessionError>;
