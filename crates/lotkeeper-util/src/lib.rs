//! Shared utilities for lotkeeper
//!
//! This crate provides:
//! - ID types (ReservationId, SlotNumber, ClientId)
//! - The facility clock and canonical date/time parsing
//! - The error taxonomy shared by every component
//! - Per-client rate limiting
//! - Default paths for socket, data, and config

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
