//! Reservation lifecycle and slot occupancy engine for lotkeeperd
//!
//! This crate is the heart of lotkeeperd, containing:
//! - Slot occupancy (park / unpark) over the fixed slot universe
//! - The vehicle pass registry that can gate walk-in parking
//! - Reservation records, lookup, and the stale-date sweep
//! - The lifecycle state machine (Pending -> Approved -> consumed | Cancelled | Expired)
//! - The timer engine that marks reservations late and expunges them after
//!   the grace period
//!
//! Every transition runs in a single store transaction and reports what
//! changed as [`CoreEvent`]s.

mod assignment;
mod events;
mod facility;
mod occupancy;
mod passes;
mod reservations;
mod timer;
mod validation;

pub use assignment::*;
pub use events::*;
pub use facility::*;
pub use occupancy::*;
pub use passes::*;
pub use reservations::*;
pub use timer::*;
pub use validation::*;
