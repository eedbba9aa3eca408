use thiserror::Error;

pub type Result<T> = std::result::Result<T, MnemosError>;

#[derive(Error, Debug)]
pub enum MnemosError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown relationship type: {0}")]
    UnknownRelationship(String),

    #[error("Unknown memory type: {0}")]
    UnknownMemoryType(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Other error: {0}")]
    Other(String),
}
