// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid script message: {0}")]
    InvalidMessage(String),

    #[error("Malformed message JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Invalid wait duration: {0}")]
    InvalidWait(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
