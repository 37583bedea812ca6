//! Persistence layer for lotkeeperd
//!
//! Provides:
//! - Parking slots and their occupants
//! - Reservations and their lifecycle fields
//! - Slot associations (approved reservation -> slot index)
//! - Vehicle passes for walk-in parking
//! - Audit log (append-only)
//!
//! Every state transition runs inside one [`StoreTx`]. A transaction that is
//! dropped without [`StoreTx::commit`] is rolled back.

mod audit;
mod sqlite;
mod traits;

pub use audit::*;
pub use sqlite::*;
pub use traits::*;

use lotkeeper_util::LotkeeperError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A persisted row could not be decoded
    #[error("Corrupt {table} row {key}: {reason}")]
    Corrupt {
        table: &'static str,
        key: String,
        reason: String,
    },
}

impl StoreError {
    pub fn corrupt(table: &'static str, key: impl ToString, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            table,
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for LotkeeperError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => LotkeeperError::NotFound(what),
            other => LotkeeperError::Storage(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
