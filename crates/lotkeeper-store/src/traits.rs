//! Store trait definitions

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use lotkeeper_api::{
    Occupant, OwnerCategory, ParkingSlot, Reservation, ReservationStatus, VehiclePass,
};
use lotkeeper_util::{ReservationId, SlotNumber};

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    /// Start a read-check-write transaction.
    ///
    /// Writers are serialized: the transaction holds the write lock from the
    /// moment it begins until it is committed or dropped.
    fn begin(&self) -> StoreResult<Box<dyn StoreTx + '_>>;

    // Audit log

    /// Append an audit event in its own transaction
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// One open transaction.
///
/// Dropping it without calling [`StoreTx::commit`] rolls every write back.
pub trait StoreTx {
    // Slots

    fn slot_count(&self) -> StoreResult<usize>;

    /// Insert a vacant slot. Returns `false` if it already existed.
    fn insert_slot(&mut self, slot: SlotNumber) -> StoreResult<bool>;

    fn get_slot(&self, slot: SlotNumber) -> StoreResult<Option<ParkingSlot>>;

    /// All slots ordered by row, then letter
    fn list_slots(&self) -> StoreResult<Vec<ParkingSlot>>;

    /// Set (`Some`) or clear (`None`) a slot's occupant along with its flag
    fn set_occupant(&mut self, slot: SlotNumber, occupant: Option<&Occupant>) -> StoreResult<()>;

    // Reservations

    fn insert_reservation(&mut self, reservation: &NewReservation) -> StoreResult<ReservationId>;

    /// Fails with [`crate::StoreError::Corrupt`] if the row cannot be decoded
    fn get_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>>;

    /// Reservations ordered by id. Rows that cannot be decoded are skipped.
    fn list_reservations(
        &self,
        status: Option<ReservationStatus>,
    ) -> StoreResult<Vec<Reservation>>;

    /// Ids of every reservation in `status`, without decoding the rows
    fn reservation_ids_with_status(
        &self,
        status: ReservationStatus,
    ) -> StoreResult<Vec<ReservationId>>;

    /// Persist the mutable lifecycle fields of an existing reservation
    fn update_reservation(&mut self, reservation: &Reservation) -> StoreResult<()>;

    /// Returns `false` if no such reservation existed
    fn delete_reservation(&mut self, id: ReservationId) -> StoreResult<bool>;

    /// Ids of reservations scheduled before `date`, whatever their status
    fn reservation_ids_before(&self, date: NaiveDate) -> StoreResult<Vec<ReservationId>>;

    // Slot associations

    fn insert_association(&mut self, id: ReservationId, slot: SlotNumber) -> StoreResult<()>;

    /// Returns `false` if the reservation had no association
    fn delete_association(&mut self, id: ReservationId) -> StoreResult<bool>;

    fn association_for(&self, id: ReservationId) -> StoreResult<Option<SlotNumber>>;

    fn associations_for_slot(&self, slot: SlotNumber) -> StoreResult<Vec<ReservationId>>;

    /// Recreate every association from approved reservations.
    /// Returns the number of associations written.
    fn rebuild_associations(&mut self) -> StoreResult<usize>;

    // Vehicle passes

    /// Insert or replace the pass for its plate. Returns `true` if it is new.
    fn upsert_vehicle_pass(&mut self, pass: &VehiclePass) -> StoreResult<bool>;

    /// Fails with [`crate::StoreError::Corrupt`] if the row cannot be decoded
    fn get_vehicle_pass(&self, plate_number: &str) -> StoreResult<Option<VehiclePass>>;

    /// Passes ordered by plate. Rows that cannot be decoded are skipped.
    fn list_vehicle_passes(&self) -> StoreResult<Vec<VehiclePass>>;

    /// Returns `false` if the plate had no pass
    fn delete_vehicle_pass(&mut self, plate_number: &str) -> StoreResult<bool>;

    // Audit

    /// Append an audit event as part of this transaction
    fn append_audit(&mut self, event: &AuditEvent) -> StoreResult<()>;

    fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// A validated submission ready to be persisted as PENDING
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub name: String,
    pub owner_category: OwnerCategory,
    pub email: String,
    pub contact_number: String,
    pub plate_number: String,
    pub vehicle_type: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub created_at: DateTime<Utc>,
}
