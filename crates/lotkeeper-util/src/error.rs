//! Error taxonomy for lotkeeper

use thiserror::Error;

/// Error returned by every slot and reservation operation
#[derive(Debug, Error)]
pub enum LotkeeperError {
    /// Malformed input, rejected before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A transition precondition did not hold
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown reservation id or slot number
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence failure; the transition was rolled back
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LotkeeperError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the same call may succeed later without caller changes
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, LotkeeperError>;
