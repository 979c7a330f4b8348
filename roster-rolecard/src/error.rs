use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoleCardError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid role card yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("no role card found for bot: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RoleCardError>;
