use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid event name: {0:?}")]
    InvalidEventName(String),

    #[error("Invalid level: {0}")]
    InvalidLevel(String),

    #[error("Invalid time expression: {0}")]
    InvalidTimeExpression(String),

    #[error("Invalid line pattern: {0}")]
    InvalidPattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
