//! Core events emitted by the engine

use chrono::{DateTime, NaiveDate, Utc};
use lotkeeper_api::{EventPayload, ParkingSlot, UpcomingReservation};
use lotkeeper_util::{ReservationId, SlotNumber};

/// Events emitted by the core engine
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A slot was parked or vacated; carries the new state
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

    ReservationLate {
        id: ReservationId,
        slot: SlotNumber,
        grace_period_until: DateTime<Utc>,
    },

    ReservationExpunged {
        id: ReservationId,
        slot: SlotNumber,
    },

    ReservationConsumed {
        id: ReservationId,
        slot: SlotNumber,
    },

    UpcomingChanged {
        upcoming: Vec<UpcomingReservation>,
    },

    StaleReservationsRemoved {
        before: NaiveDate,
        removed: Vec<ReservationId>,
    },

    ReservationDeleted {
        id: ReservationId,
    },
}

impl From<CoreEvent> for EventPayload {
    fn from(event: CoreEvent) -> Self {
        match event {
            CoreEvent::SlotChanged(slot) => EventPayload::SlotChanged(slot),
            CoreEvent::ReservationSubmitted { id } => EventPayload::ReservationSubmitted { id },
            CoreEvent::ReservationApproved { id, slot } => {
                EventPayload::ReservationApproved { id, slot }
            }
            CoreEvent::ReservationRejected { id } => EventPayload::ReservationRejected { id },
            CoreEvent::ReservationCancelled { id, slot } => {
                EventPayload::ReservationCancelled { id, slot }
            }
            CoreEvent::ReservationLate {
                id,
                slot,
                grace_period_until,
            } => EventPayload::ReservationLate {
                id,
                slot,
                grace_period_until,
            },
            CoreEvent::ReservationExpunged { id, slot } => {
                EventPayload::ReservationExpunged { id, slot }
            }
            CoreEvent::ReservationConsumed { id, slot } => {
                EventPayload::ReservationConsumed { id, slot }
            }
            CoreEvent::UpcomingChanged { upcoming } => EventPayload::UpcomingChanged { upcoming },
            CoreEvent::StaleReservationsRemoved { before, removed } => {
                EventPayload::StaleReservationsRemoved { before, removed }
            }
            CoreEvent::ReservationDeleted { id } => EventPayload::ReservationDeleted { id },
        }
    }
}
