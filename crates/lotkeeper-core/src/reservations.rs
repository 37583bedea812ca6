//! Reservation records: creation, lookup, and the stale-date sweep

use chrono::{DateTime, FixedOffset, NaiveDate};
use lotkeeper_api::{Reservation, ReservationRequest, ReservationStatus};
use lotkeeper_store::{AuditEvent, AuditEventType, Store};
use lotkeeper_util::{FacilityClock, LotkeeperError, ReservationId, Result, SlotNumber};
use std::sync::Arc;
use tracing::{debug, info};

use crate::validate_request;

/// Owns reservation rows and their slot index
#[derive(Clone)]
pub struct ReservationStore {
    store: Arc<dyn Store>,
    clock: FacilityClock,
}

impl ReservationStore {
    pub fn new(store: Arc<dyn Store>, clock: FacilityClock) -> Self {
        Self { store, clock }
    }

    /// Validate a submission and persist it as PENDING
    pub fn create(&self, request: &ReservationRequest) -> Result<ReservationId> {
        let row = validate_request(request, lotkeeper_util::now())?;

        let mut tx = self.store.begin()?;
        let id = tx.insert_reservation(&row)?;
        tx.append_audit(&AuditEvent::new(AuditEventType::ReservationSubmitted {
            reservation_id: id,
            plate_number: row.plate_number.clone(),
            scheduled_date: row.scheduled_date,
        }))?;
        tx.commit()?;

        info!(
            reservation_id = %id,
            plate = %row.plate_number,
            date = %row.scheduled_date,
            time = %row.scheduled_time.format(lotkeeper_util::TIME_FORMAT),
            "Reservation submitted"
        );
        Ok(id)
    }

    pub fn get(&self, id: ReservationId) -> Result<Reservation> {
        let tx = self.store.begin()?;
        tx.get_reservation(id)?
            .ok_or_else(|| LotkeeperError::not_found(format!("reservation {}", id)))
    }

    /// All reservations, or only those in `status`, ordered by id
    pub fn list(&self, status: Option<ReservationStatus>) -> Result<Vec<Reservation>> {
        let tx = self.store.begin()?;
        Ok(tx.list_reservations(status)?)
    }

    /// Earliest reservation bound to `slot` whose scheduled instant is at or
    /// after `reference`. Ties go to the lower id.
    pub fn find_next_for_slot(
        &self,
        slot: SlotNumber,
        reference: DateTime<FixedOffset>,
    ) -> Result<Option<Reservation>> {
        let tx = self.store.begin()?;
        if tx.get_slot(slot)?.is_none() {
            return Err(LotkeeperError::not_found(format!("slot {}", slot)));
        }

        let mut next: Option<Reservation> = None;
        for id in tx.associations_for_slot(slot)? {
            let reservation = match tx.get_reservation(id) {
                Ok(Some(r)) => r,
                Ok(None) => continue,
                Err(e) => {
                    debug!(reservation_id = %id, error = %e, "Skipping unreadable reservation");
                    continue;
                }
            };

            let scheduled = self
                .clock
                .scheduled_instant(reservation.scheduled_date, reservation.scheduled_time);
            if scheduled < reference {
                continue;
            }

            let key = |r: &Reservation| (r.scheduled_date, r.scheduled_time, r.id);
            if next.as_ref().is_none_or(|best| key(&reservation) < key(best)) {
                next = Some(reservation);
            }
        }

        Ok(next)
    }

    /// Remove a reservation in any status, along with its slot association
    pub fn delete(&self, id: ReservationId) -> Result<()> {
        let mut tx = self.store.begin()?;
        if !tx.delete_reservation(id)? {
            return Err(LotkeeperError::not_found(format!("reservation {}", id)));
        }
        tx.append_audit(&AuditEvent::new(AuditEventType::ReservationDeleted {
            reservation_id: id,
        }))?;
        tx.commit()?;

        info!(reservation_id = %id, "Reservation deleted");
        Ok(())
    }

    /// Delete every reservation scheduled before `reference_date`, whatever
    /// its status, along with its slot association.
    pub fn delete_stale(&self, reference_date: NaiveDate) -> Result<Vec<ReservationId>> {
        let mut tx = self.store.begin()?;

        let stale = tx.reservation_ids_before(reference_date)?;
        if stale.is_empty() {
            debug!(before = %reference_date, "No stale reservations");
            return Ok(stale);
        }

        for id in &stale {
            tx.delete_reservation(*id)?;
        }
        tx.append_audit(&AuditEvent::new(AuditEventType::StaleReservationsRemoved {
            before: reference_date,
            removed: stale.clone(),
        }))?;
        tx.commit()?;

        info!(
            before = %reference_date,
            count = stale.len(),
            removed = ?stale.iter().map(ReservationId::get).collect::<Vec<_>>(),
            "Stale reservations removed"
        );
        Ok(stale)
    }

    /// Rebuild the slot association index from approved reservations
    pub fn rebuild_index(&self) -> Result<usize> {
        let mut tx = self.store.begin()?;
        let written = tx.rebuild_associations()?;
        tx.commit()?;

        info!(associations = written, "Slot index rebuilt");
        Ok(written)
    }

    pub fn clock(&self) -> FacilityClock {
        self.clock
    }
}
