//! Admin-driven lifecycle transitions

use chrono::{DateTime, Utc};
use lotkeeper_api::{ParkingSlot, Reservation, ReservationStatus};
use lotkeeper_store::{AuditEvent, AuditEventType, Store, StoreTx};
use lotkeeper_util::{LotkeeperError, ReservationId, Result, SlotNumber};
use std::sync::Arc;
use tracing::info;

use crate::CoreEvent;

/// Applies accept, reject, cancel, and park transitions.
///
/// Each call is one read-check-write transaction; a failed precondition
/// leaves the store untouched.
#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn Store>,
}

fn load(tx: &dyn StoreTx, id: ReservationId) -> Result<Reservation> {
    tx.get_reservation(id)?
        .ok_or_else(|| LotkeeperError::not_found(format!("reservation {}", id)))
}

fn require_status(reservation: &Reservation, expected: ReservationStatus) -> Result<()> {
    if reservation.status != expected {
        return Err(LotkeeperError::conflict(format!(
            "reservation {} is {}, expected {}",
            reservation.id, reservation.status, expected
        )));
    }
    Ok(())
}

fn bound_slot(reservation: &Reservation) -> Result<SlotNumber> {
    reservation.assigned_slot.ok_or_else(|| {
        LotkeeperError::storage(format!(
            "approved reservation {} has no assigned slot",
            reservation.id
        ))
    })
}

impl AssignmentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Approve a PENDING reservation and bind it to `slot`
    pub fn accept(&self, id: ReservationId, slot: SlotNumber) -> Result<CoreEvent> {
        let mut tx = self.store.begin()?;

        let mut reservation = load(&*tx, id)?;
        if tx.get_slot(slot)?.is_none() {
            return Err(LotkeeperError::not_found(format!("slot {}", slot)));
        }
        require_status(&reservation, ReservationStatus::Pending)?;

        for other in tx.associations_for_slot(slot)? {
            let Some(holder) = tx.get_reservation(other)? else {
                continue;
            };
            if holder.status == ReservationStatus::Approved
                && holder.scheduled_date == reservation.scheduled_date
                && holder.scheduled_time == reservation.scheduled_time
            {
                return Err(LotkeeperError::conflict(format!(
                    "slot {} is already reserved by {} at that time",
                    slot, holder.id
                )));
            }
        }

        reservation.status = ReservationStatus::Approved;
        reservation.assigned_slot = Some(slot);
        reservation.is_late = false;
        reservation.grace_period_until = None;
        tx.update_reservation(&reservation)?;
        tx.insert_association(id, slot)?;
        tx.append_audit(&AuditEvent::new(AuditEventType::ReservationApproved {
            reservation_id: id,
            slot,
        }))?;
        tx.commit()?;

        info!(reservation_id = %id, slot = %slot, "Reservation approved");
        Ok(CoreEvent::ReservationApproved { id, slot })
    }

    /// Reject a PENDING reservation
    pub fn reject(&self, id: ReservationId) -> Result<CoreEvent> {
        let mut tx = self.store.begin()?;

        let mut reservation = load(&*tx, id)?;
        require_status(&reservation, ReservationStatus::Pending)?;

        reservation.status = ReservationStatus::Rejected;
        tx.update_reservation(&reservation)?;
        tx.append_audit(&AuditEvent::new(AuditEventType::ReservationRejected {
            reservation_id: id,
        }))?;
        tx.commit()?;

        info!(reservation_id = %id, "Reservation rejected");
        Ok(CoreEvent::ReservationRejected { id })
    }

    /// Withdraw an APPROVED binding
    pub fn cancel_approved(&self, id: ReservationId) -> Result<CoreEvent> {
        let mut tx = self.store.begin()?;

        let mut reservation = load(&*tx, id)?;
        require_status(&reservation, ReservationStatus::Approved)?;
        let slot = bound_slot(&reservation)?;

        reservation.status = ReservationStatus::Cancelled;
        reservation.assigned_slot = None;
        reservation.is_late = false;
        reservation.grace_period_until = None;
        tx.update_reservation(&reservation)?;
        tx.delete_association(id)?;
        tx.append_audit(&AuditEvent::new(AuditEventType::ReservationCancelled {
            reservation_id: id,
            slot,
        }))?;
        tx.commit()?;

        info!(reservation_id = %id, slot = %slot, "Approved reservation cancelled");
        Ok(CoreEvent::ReservationCancelled { id, slot })
    }

    /// Park the reserved vehicle in its bound slot and retire the reservation
    pub fn park_reservation(&self, id: ReservationId) -> Result<Vec<CoreEvent>> {
        self.park_reservation_at(id, lotkeeper_util::now())
    }

    /// [`Self::park_reservation`] as of `now`.
    ///
    /// A late reservation whose grace period has run out conflicts even if
    /// the timer has not expunged it yet.
    pub fn park_reservation_at(
        &self,
        id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CoreEvent>> {
        let mut tx = self.store.begin()?;

        let reservation = load(&*tx, id)?;
        require_status(&reservation, ReservationStatus::Approved)?;
        let slot = bound_slot(&reservation)?;

        if let Some(until) = reservation.grace_period_until.filter(|until| now >= *until) {
            return Err(LotkeeperError::conflict(format!(
                "reservation {} lapsed at {}; its grace period is over",
                id,
                until.to_rfc3339()
            )));
        }

        let current = tx
            .get_slot(slot)?
            .ok_or_else(|| LotkeeperError::not_found(format!("slot {}", slot)))?;
        if current.occupied {
            return Err(LotkeeperError::conflict(format!(
                "slot {} is occupied; reservation {} cannot park",
                slot, id
            )));
        }

        let occupant = reservation.occupant();
        tx.set_occupant(slot, Some(&occupant))?;
        tx.delete_association(id)?;
        tx.delete_reservation(id)?;
        tx.append_audit(&AuditEvent::new(AuditEventType::ReservationConsumed {
            reservation_id: id,
            slot,
        }))?;
        tx.append_audit(&AuditEvent::new(AuditEventType::VehicleParked {
            slot,
            plate_number: occupant.plate_number.clone(),
        }))?;
        tx.commit()?;

        info!(
            reservation_id = %id,
            slot = %slot,
            plate = %occupant.plate_number,
            "Reservation consumed"
        );
        Ok(vec![
            CoreEvent::ReservationConsumed { id, slot },
            CoreEvent::SlotChanged(ParkingSlot::occupied_by(slot, occupant)),
        ])
    }
}
