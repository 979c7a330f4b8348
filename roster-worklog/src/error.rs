use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkLogError {
    #[error("session log not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, WorkLogError>;
