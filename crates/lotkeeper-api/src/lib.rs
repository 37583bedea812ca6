//! Data model and protocol types for lotkeeperd
//!
//! This crate defines the stable API between lotkeeperd and its clients
//! (admin console, kiosk, submission form):
//! - Slots, occupants, and reservations
//! - Commands (requests from clients) and responses
//! - Events (service -> clients)
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
