//! Audit event types

use chrono::{DateTime, NaiveDate, Utc};
use lotkeeper_util::{ReservationId, SlotNumber};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    ConfigLoaded {
        slot_count: usize,
        grace_period_secs: u64,
    },

    /// Slot universe written to an empty store
    SlotsInitialized { created: usize },

    ReservationSubmitted {
        reservation_id: ReservationId,
        plate_number: String,
        scheduled_date: NaiveDate,
    },

    ReservationApproved {
        reservation_id: ReservationId,
        slot: SlotNumber,
    },

    ReservationRejected { reservation_id: ReservationId },

    ReservationCancelled {
        reservation_id: ReservationId,
        slot: SlotNumber,
    },

    /// Scheduled time passed without the vehicle arriving
    ReservationLate {
        reservation_id: ReservationId,
        slot: SlotNumber,
        grace_period_until: DateTime<Utc>,
    },

    /// Grace period elapsed; binding removed
    ReservationExpunged {
        reservation_id: ReservationId,
        slot: SlotNumber,
    },

    /// Reserved vehicle parked; reservation deleted
    ReservationConsumed {
        reservation_id: ReservationId,
        slot: SlotNumber,
    },

    VehicleParked {
        slot: SlotNumber,
        plate_number: String,
    },

    VehicleUnparked {
        slot: SlotNumber,
        plate_number: String,
    },

    StaleReservationsRemoved {
        before: NaiveDate,
        removed: Vec<ReservationId>,
    },

    /// Reservation removed by an admin
    ReservationDeleted { reservation_id: ReservationId },

    /// Pass created or renewed
    VehiclePassRegistered {
        plate_number: String,
        valid_until: NaiveDate,
    },

    VehiclePassRevoked { plate_number: String },

    /// Walk-in refused for a missing or expired pass
    VehiclePassDenied {
        slot: SlotNumber,
        plate_number: String,
        reason: String,
    },

    /// Client connected
    ClientConnected { client_id: String, uid: Option<u32> },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

impl AuditEventType {
    /// Stable name of the event kind, as serialized in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEventType::ServiceStarted => "service_started",
            AuditEventType::ServiceStopped => "service_stopped",
            AuditEventType::ConfigLoaded { .. } => "config_loaded",
            AuditEventType::SlotsInitialized { .. } => "slots_initialized",
            AuditEventType::ReservationSubmitted { .. } => "reservation_submitted",
            AuditEventType::ReservationApproved { .. } => "reservation_approved",
            AuditEventType::ReservationRejected { .. } => "reservation_rejected",
            AuditEventType::ReservationCancelled { .. } => "reservation_cancelled",
            AuditEventType::ReservationLate { .. } => "reservation_late",
            AuditEventType::ReservationExpunged { .. } => "reservation_expunged",
            AuditEventType::ReservationConsumed { .. } => "reservation_consumed",
            AuditEventType::VehicleParked { .. } => "vehicle_parked",
            AuditEventType::VehicleUnparked { .. } => "vehicle_unparked",
            AuditEventType::StaleReservationsRemoved { .. } => "stale_reservations_removed",
            AuditEventType::ReservationDeleted { .. } => "reservation_deleted",
            AuditEventType::VehiclePassRegistered { .. } => "vehicle_pass_registered",
            AuditEventType::VehiclePassRevoked { .. } => "vehicle_pass_revoked",
            AuditEventType::VehiclePassDenied { .. } => "vehicle_pass_denied",
            AuditEventType::ClientConnected { .. } => "client_connected",
            AuditEventType::ClientDisconnected { .. } => "client_disconnected",
        }
    }
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: lotkeeper_util::now(),
            event,
        }
    }

    /// Wire form for `GetAuditLog`
    pub fn to_record(&self) -> lotkeeper_api::AuditRecord {
        lotkeeper_api::AuditRecord {
            id: self.id,
            timestamp: self.timestamp,
            event_type: self.event.kind().to_string(),
            details: serde_json::to_value(&self.event).unwrap_or(serde_json::Value::Null),
        }
    }
}
