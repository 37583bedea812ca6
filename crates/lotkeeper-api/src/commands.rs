//! Command types for the lotkeeperd protocol

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use lotkeeper_util::{ClientId, LotkeeperError, ReservationId, SlotNumber};
use serde::{Deserialize, Serialize};

use crate::{
    HealthStatus, Occupant, ParkingSlot, Reservation, ReservationRequest, ReservationStatus,
    ServiceStateSnapshot, VehiclePass, API_VERSION,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&LotkeeperError> for ErrorInfo {
    fn from(err: &LotkeeperError) -> Self {
        let code = match err {
            LotkeeperError::Validation(_) => ErrorCode::ValidationFailed,
            LotkeeperError::Conflict(_) => ErrorCode::Conflict,
            LotkeeperError::NotFound(_) => ErrorCode::NotFound,
            LotkeeperError::Storage(_) => ErrorCode::StorageError,
            LotkeeperError::Config(_) => ErrorCode::ConfigError,
        };
        ErrorInfo::new(code, err.to_string())
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    ValidationFailed,
    Conflict,
    NotFound,
    StorageError,
    RateLimited,
    ConfigError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get current facility summary
    GetState,

    /// Get health status
    GetHealth,

    // Slot queries

    ListSlots,

    GetSlot { slot: SlotNumber },

    // Reservation queries

    /// List reservations, optionally only those in one status
    ListReservations {
        #[serde(default)]
        status: Option<ReservationStatus>,
    },

    GetReservation { id: ReservationId },

    /// Earliest reservation bound to `slot` at or after `after` (default: now)
    FindNextForSlot {
        slot: SlotNumber,
        #[serde(default)]
        after: Option<DateTime<FixedOffset>>,
    },

    // Submission channel

    SubmitReservation { request: ReservationRequest },

    // Admin mutations

    /// Approve a pending reservation and bind it to a slot
    Accept { id: ReservationId, slot: SlotNumber },

    Reject { id: ReservationId },

    /// Withdraw an approved binding
    CancelApproved { id: ReservationId },

    /// Move an approved reservation's vehicle into its slot
    ParkReservation { id: ReservationId },

    /// Walk-in parking without a reservation
    Park { slot: SlotNumber, occupant: Occupant },

    Unpark { slot: SlotNumber },

    /// Remove a reservation outright, whatever its status
    DeleteReservation { id: ReservationId },

    // Vehicle passes

    ListVehiclePasses,

    GetVehiclePass { plate_number: String },

    /// Create or renew the pass for a plate
    RegisterVehiclePass { pass: VehiclePass },

    RevokeVehiclePass { plate_number: String },

    /// Delete reservations scheduled before `before` (default: facility today)
    SweepStale {
        #[serde(default)]
        before: Option<NaiveDate>,
    },

    /// Most recent audit entries, newest first
    GetAuditLog { limit: usize },

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Ping for keepalive
    Ping,
}

/// One audit log entry as shown to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub details: serde_json::Value,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    State(ServiceStateSnapshot),
    Health(HealthStatus),
    Slots {
        slots: Vec<ParkingSlot>,
    },
    Slot(ParkingSlot),
    Reservations {
        reservations: Vec<Reservation>,
    },
    Reservation(Reservation),
    NextReservation {
        reservation: Option<Reservation>,
    },
    Submitted {
        id: ReservationId,
    },
    Approved {
        id: ReservationId,
        slot: SlotNumber,
    },
    Rejected {
        id: ReservationId,
    },
    Cancelled {
        id: ReservationId,
    },
    ReservationParked {
        id: ReservationId,
        slot: SlotNumber,
    },
    Parked {
        slot: SlotNumber,
    },
    Unparked {
        slot: SlotNumber,
    },
    Deleted {
        id: ReservationId,
    },
    StaleRemoved {
        removed: Vec<ReservationId>,
    },
    VehiclePasses {
        passes: Vec<VehiclePass>,
    },
    VehiclePass(VehiclePass),
    VehiclePassRevoked {
        plate_number: String,
    },
    AuditLog {
        entries: Vec<AuditRecord>,
    },
    Subscribed {
        client_id: ClientId,
    },
    Unsubscribed,
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = Request::new(
            1,
            Command::Accept {
                id: ReservationId::new(4),
                slot: "1A".parse().unwrap(),
            },
        );
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"accept\""));
        assert!(json.contains("\"slot\":\"1A\""));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, 1);
        assert!(matches!(parsed.command, Command::Accept { id, .. } if id.get() == 4));
    }

    #[test]
    fn optional_fields_may_be_omitted() {
        let json = r#"{"request_id":2,"api_version":1,"command":{"type":"list_reservations"}}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(
            parsed.command,
            Command::ListReservations { status: None }
        ));

        let json = r#"{"request_id":3,"api_version":1,"command":{"type":"sweep_stale","before":"2025-06-02"}}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed.command, Command::SweepStale { before: Some(_) }));
    }

    #[test]
    fn vehicle_pass_command_parses() {
        let json = r#"{"request_id":4,"api_version":1,"command":{"type":"register_vehicle_pass","pass":{"plate_number":"abc 1234","owner_name":"Ana","owner_category":"staff","vehicle_type":"Sedan","valid_until":"2025-12-31"}}}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        match parsed.command {
            Command::RegisterVehiclePass { pass } => {
                assert_eq!(pass.owner_category, crate::OwnerCategory::Staff);
                assert_eq!(pass.valid_until, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn response_serialization() {
        let resp = Response::success(
            1,
            ResponsePayload::Slots {
                slots: vec![ParkingSlot::vacant("2C".parse().unwrap())],
            },
        );

        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 1);
        match parsed.result {
            ResponseResult::Ok(ResponsePayload::Slots { slots }) => {
                assert_eq!(slots.len(), 1);
                assert!(!slots[0].occupied);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn error_codes_follow_error_kind() {
        let info = ErrorInfo::from(&LotkeeperError::conflict("reservation 3 is not pending"));
        assert_eq!(info.code, ErrorCode::Conflict);
        assert!(info.message.contains("not pending"));

        let info = ErrorInfo::from(&LotkeeperError::validation("bad plate"));
        assert_eq!(info.code, ErrorCode::ValidationFailed);

        let info = ErrorInfo::from(&LotkeeperError::not_found("slot 9Z"));
        assert_eq!(info.code, ErrorCode::NotFound);
    }
}
