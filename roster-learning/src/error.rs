use thiserror::Error;

#[derive(Debug, Error)]
pub enum LearningExchangeError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("package not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, LearningExchangeError>;
