//! Event types for lotkeeperd -> client streaming

use chrono::{DateTime, NaiveDate, Utc};
use lotkeeper_util::{ReservationId, SlotNumber};
use serde::{Deserialize, Serialize};

use crate::{ParkingSlot, UpcomingReservation, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: lotkeeper_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A slot was parked or vacated
    SlotChanged(ParkingSlot),

    ReservationSubmitted {
        id: ReservationId,
    },

    ReservationApproved {
        id: ReservationId,
        slot: SlotNumber,
    },

    ReservationRejected {
        id: ReservationId,
    },

    ReservationCancelled {
        id: ReservationId,
        slot: SlotNumber,
    },

    /// Scheduled time passed; the grace period is running
    ReservationLate {
        id: ReservationId,
        slot: SlotNumber,
        grace_period_until: DateTime<Utc>,
    },

    /// Grace period elapsed; the binding is gone
    ReservationExpunged {
        id: ReservationId,
        slot: SlotNumber,
    },

    /// The reserved vehicle parked; the reservation is gone
    ReservationConsumed {
        id: ReservationId,
        slot: SlotNumber,
    },

    /// Set of approved reservations starting soon changed
    UpcomingChanged {
        upcoming: Vec<UpcomingReservation>,
    },

    StaleReservationsRemoved {
        before: NaiveDate,
        removed: Vec<ReservationId>,
    },

    /// Removed by an admin
    ReservationDeleted {
        id: ReservationId,
    },

    /// Service is shutting down
    Shutdown,
}
