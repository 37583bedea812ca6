//! Shared data model for slots and reservations

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use lotkeeper_util::{ClientId, LotkeeperError, ReservationId, SlotNumber};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Who the vehicle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerCategory {
    Student,
    Faculty,
    Staff,
    Visitor,
}

impl OwnerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerCategory::Student => "student",
            OwnerCategory::Faculty => "faculty",
            OwnerCategory::Staff => "staff",
            OwnerCategory::Visitor => "visitor",
        }
    }
}

impl fmt::Display for OwnerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerCategory {
    type Err = LotkeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(OwnerCategory::Student),
            "faculty" => Ok(OwnerCategory::Faculty),
            "staff" => Ok(OwnerCategory::Staff),
            "visitor" => Ok(OwnerCategory::Visitor),
            other => Err(LotkeeperError::validation(format!(
                "unknown owner category '{}'",
                other
            ))),
        }
    }
}

/// Vehicle and owner data held by an occupied slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub vehicle_type: String,
    pub owner_name: String,
    pub plate_number: String,
    pub owner_category: OwnerCategory,
    pub contact_number: String,
}

/// Registration that lets a vehicle park without a reservation.
///
/// The pass is valid through the end of `valid_until` in facility-local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehiclePass {
    pub plate_number: String,
    pub owner_name: String,
    pub owner_category: OwnerCategory,
    pub vehicle_type: String,
    pub valid_until: NaiveDate,
}

impl VehiclePass {
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        date <= self.valid_until
    }
}

/// A physical parking slot.
///
/// `occupant` is `Some` exactly when `occupied` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingSlot {
    pub slot_number: SlotNumber,
    pub occupied: bool,
    pub occupant: Option<Occupant>,
}

impl ParkingSlot {
    pub fn vacant(slot_number: SlotNumber) -> Self {
        Self {
            slot_number,
            occupied: false,
            occupant: None,
        }
    }

    pub fn occupied_by(slot_number: SlotNumber, occupant: Occupant) -> Self {
        Self {
            slot_number,
            occupied: true,
            occupant: Some(occupant),
        }
    }
}

/// Reservation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Submitted, awaiting an admin decision
    Pending,
    /// Bound to a slot
    Approved,
    Rejected,
    /// Approved binding withdrawn by an admin
    Cancelled,
    /// Approved binding lapsed after the grace period
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Approved => "approved",
            ReservationStatus::Rejected => "rejected",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }

    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Rejected | ReservationStatus::Cancelled | ReservationStatus::Expired
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = LotkeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ReservationStatus::Pending),
            "approved" => Ok(ReservationStatus::Approved),
            "rejected" => Ok(ReservationStatus::Rejected),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "expired" => Ok(ReservationStatus::Expired),
            other => Err(LotkeeperError::validation(format!(
                "unknown reservation status '{}'",
                other
            ))),
        }
    }
}

/// A parking reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub name: String,
    pub owner_category: OwnerCategory,
    pub email: String,
    pub contact_number: String,
    pub plate_number: String,
    pub vehicle_type: String,
    /// Facility-local calendar date
    pub scheduled_date: NaiveDate,
    /// Facility-local time of day
    pub scheduled_time: NaiveTime,
    pub status: ReservationStatus,
    pub assigned_slot: Option<SlotNumber>,
    pub is_late: bool,
    /// Set once, when the reservation is first found late
    pub grace_period_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Check the cross-field invariants of a reservation row.
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let approved = self.status == ReservationStatus::Approved;
        if approved != self.assigned_slot.is_some() {
            return Err(format!(
                "reservation {} is {} but assigned_slot is {:?}",
                self.id, self.status, self.assigned_slot
            ));
        }
        if self.is_late && (self.assigned_slot.is_none() || self.grace_period_until.is_none()) {
            return Err(format!(
                "reservation {} is late without a slot and grace deadline",
                self.id
            ));
        }
        Ok(())
    }

    /// Vehicle data that moves into the slot when the reservation is consumed
    pub fn occupant(&self) -> Occupant {
        Occupant {
            vehicle_type: self.vehicle_type.clone(),
            owner_name: self.name.clone(),
            plate_number: self.plate_number.clone(),
            owner_category: self.owner_category,
            contact_number: self.contact_number.clone(),
        }
    }
}

/// Raw submission as received from the public form.
///
/// Every field is unvalidated text; the reservation store validates and
/// normalizes it before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub name: String,
    pub owner_category: String,
    pub email: String,
    pub contact_number: String,
    pub plate_number: String,
    pub vehicle_type: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, 24-hour
    pub time: String,
}

/// An approved reservation starting soon, for display only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingReservation {
    pub reservation_id: ReservationId,
    pub slot_number: SlotNumber,
    pub name: String,
    pub plate_number: String,
    pub scheduled_at: DateTime<FixedOffset>,
    pub starts_in: Duration,
}

/// Summary of the facility at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStateSnapshot {
    pub api_version: u32,
    pub facility_time: DateTime<FixedOffset>,
    pub slot_count: usize,
    pub occupied_count: usize,
    pub pending_count: usize,
    pub approved_count: usize,
    pub late_count: usize,
    #[serde(default)]
    pub upcoming: Vec<UpcomingReservation>,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub timer_running: bool,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new() -> Self {
        Self {
            client_id: ClientId::new(),
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new()
    }
}
