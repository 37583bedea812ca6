//! SQLite-based store implementation

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use lotkeeper_api::{
    Occupant, OwnerCategory, ParkingSlot, Reservation, ReservationStatus, VehiclePass,
};
use lotkeeper_util::{ReservationId, SlotNumber, DATE_FORMAT, TIME_FORMAT};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{AuditEvent, AuditEventType, NewReservation, Store, StoreError, StoreResult, StoreTx};

/// How long a writer waits on another process's lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const RESERVATION_COLUMNS: &str = "id, name, owner_category, email, contact_number, \
    plate_number, vehicle_type, scheduled_date, scheduled_time, status, assigned_slot, \
    is_late, grace_period_until, created_at";

const SLOT_COLUMNS: &str =
    "slot_number, occupied, vehicle_type, owner_name, plate_number, owner_category, contact_number";

const PASS_COLUMNS: &str = "plate_number, owner_name, owner_category, vehicle_type, valid_until";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened database");

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Physical slots; occupant columns are all NULL while vacant
            CREATE TABLE IF NOT EXISTS parking_slots (
                slot_number TEXT PRIMARY KEY,
                row_index INTEGER NOT NULL,
                letter TEXT NOT NULL,
                occupied INTEGER NOT NULL DEFAULT 0,
                vehicle_type TEXT,
                owner_name TEXT,
                plate_number TEXT,
                owner_category TEXT,
                contact_number TEXT,
                CHECK ((occupied = 1) = (owner_name IS NOT NULL AND plate_number IS NOT NULL))
            );

            -- Reservations; only approved ones hold a slot
            CREATE TABLE IF NOT EXISTS reservations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                owner_category TEXT NOT NULL,
                email TEXT NOT NULL,
                contact_number TEXT NOT NULL,
                plate_number TEXT NOT NULL,
                vehicle_type TEXT NOT NULL,
                scheduled_date TEXT NOT NULL,
                scheduled_time TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                assigned_slot TEXT REFERENCES parking_slots(slot_number),
                is_late INTEGER NOT NULL DEFAULT 0,
                grace_period_until TEXT,
                created_at TEXT NOT NULL,
                CHECK ((status = 'approved') = (assigned_slot IS NOT NULL))
            );

            -- Slot index over approved reservations
            CREATE TABLE IF NOT EXISTS slot_associations (
                reservation_id INTEGER PRIMARY KEY
                    REFERENCES reservations(id) ON DELETE CASCADE,
                slot_number TEXT NOT NULL REFERENCES parking_slots(slot_number)
            );

            -- Registered vehicles allowed to park without a reservation
            CREATE TABLE IF NOT EXISTS vehicle_passes (
                plate_number TEXT PRIMARY KEY,
                owner_name TEXT NOT NULL,
                owner_category TEXT NOT NULL,
                vehicle_type TEXT NOT NULL,
                valid_until TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_reservations_status ON reservations(status);
            CREATE INDEX IF NOT EXISTS idx_reservations_date ON reservations(scheduled_date);
            CREATE INDEX IF NOT EXISTS idx_associations_slot ON slot_associations(slot_number);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTx + '_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTx {
            conn,
            finished: false,
        }))
    }

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        let mut tx = self.begin()?;
        tx.append_audit(&event)?;
        tx.commit()
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| lotkeeper_util::now());
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

/// Transaction holding the connection lock until commit or drop
struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("Transaction rolled back"),
            Err(e) => warn!(error = %e, "Rollback failed"),
        }
    }
}

impl StoreTx for SqliteTx<'_> {
    fn slot_count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM parking_slots", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert_slot(&mut self, slot: SlotNumber) -> StoreResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO parking_slots (slot_number, row_index, letter) VALUES (?, ?, ?)",
            params![slot.to_string(), slot.row(), slot.letter().to_string()],
        )?;
        Ok(inserted == 1)
    }

    fn get_slot(&self, slot: SlotNumber) -> StoreResult<Option<ParkingSlot>> {
        let sql = format!("SELECT {} FROM parking_slots WHERE slot_number = ?", SLOT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [slot.to_string()], SlotRow::from_row)
            .optional()?;
        row.map(SlotRow::decode).transpose()
    }

    fn list_slots(&self) -> StoreResult<Vec<ParkingSlot>> {
        let sql = format!(
            "SELECT {} FROM parking_slots ORDER BY row_index, letter",
            SLOT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], SlotRow::from_row)?;

        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?.decode()?);
        }
        Ok(slots)
    }

    fn set_occupant(&mut self, slot: SlotNumber, occupant: Option<&Occupant>) -> StoreResult<()> {
        let updated = self.conn.execute(
            r#"
            UPDATE parking_slots
            SET occupied = ?, vehicle_type = ?, owner_name = ?, plate_number = ?,
                owner_category = ?, contact_number = ?
            WHERE slot_number = ?
            "#,
            params![
                occupant.is_some(),
                occupant.map(|o| o.vehicle_type.as_str()),
                occupant.map(|o| o.owner_name.as_str()),
                occupant.map(|o| o.plate_number.as_str()),
                occupant.map(|o| o.owner_category.as_str()),
                occupant.map(|o| o.contact_number.as_str()),
                slot.to_string(),
            ],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("slot {}", slot)));
        }
        debug!(slot = %slot, occupied = occupant.is_some(), "Slot occupancy written");
        Ok(())
    }

    fn insert_reservation(&mut self, reservation: &NewReservation) -> StoreResult<ReservationId> {
        self.conn.execute(
            r#"
            INSERT INTO reservations (
                name, owner_category, email, contact_number, plate_number, vehicle_type,
                scheduled_date, scheduled_time, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                reservation.name,
                reservation.owner_category.as_str(),
                reservation.email,
                reservation.contact_number,
                reservation.plate_number,
                reservation.vehicle_type,
                reservation.scheduled_date.format(DATE_FORMAT).to_string(),
                reservation.scheduled_time.format(TIME_FORMAT).to_string(),
                reservation.created_at.to_rfc3339(),
            ],
        )?;

        let id = ReservationId::new(self.conn.last_insert_rowid());
        debug!(reservation_id = %id, "Reservation row inserted");
        Ok(id)
    }

    fn get_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        let sql = format!("SELECT {} FROM reservations WHERE id = ?", RESERVATION_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [id.get()], ReservationRow::from_row)
            .optional()?;
        row.map(ReservationRow::decode).transpose()
    }

    fn list_reservations(
        &self,
        status: Option<ReservationStatus>,
    ) -> StoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservations WHERE (?1 IS NULL OR status = ?1) ORDER BY id",
            RESERVATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([status.map(|s| s.as_str())], ReservationRow::from_row)?;

        let mut reservations = Vec::new();
        for row in rows {
            match row?.decode() {
                Ok(reservation) => reservations.push(reservation),
                Err(e) => debug!(error = %e, "Skipping undecodable reservation"),
            }
        }
        Ok(reservations)
    }

    fn reservation_ids_with_status(
        &self,
        status: ReservationStatus,
    ) -> StoreResult<Vec<ReservationId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM reservations WHERE status = ? ORDER BY id")?;
        let ids = stmt
            .query_map([status.as_str()], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(ReservationId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn update_reservation(&mut self, reservation: &Reservation) -> StoreResult<()> {
        let updated = self.conn.execute(
            r#"
            UPDATE reservations
            SET status = ?, assigned_slot = ?, is_late = ?, grace_period_until = ?
            WHERE id = ?
            "#,
            params![
                reservation.status.as_str(),
                reservation.assigned_slot.map(|s| s.to_string()),
                reservation.is_late,
                reservation.grace_period_until.map(|t| t.to_rfc3339()),
                reservation.id.get(),
            ],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("reservation {}", reservation.id)));
        }
        Ok(())
    }

    fn delete_reservation(&mut self, id: ReservationId) -> StoreResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM reservations WHERE id = ?", [id.get()])?;
        Ok(deleted == 1)
    }

    fn reservation_ids_before(&self, date: NaiveDate) -> StoreResult<Vec<ReservationId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM reservations WHERE scheduled_date < ? ORDER BY id")?;
        let ids = stmt
            .query_map([date.format(DATE_FORMAT).to_string()], |row| {
                row.get::<_, i64>(0)
            })?
            .map(|id| id.map(ReservationId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn insert_association(&mut self, id: ReservationId, slot: SlotNumber) -> StoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO slot_associations (reservation_id, slot_number)
            VALUES (?, ?)
            ON CONFLICT(reservation_id)
            DO UPDATE SET slot_number = excluded.slot_number
            "#,
            params![id.get(), slot.to_string()],
        )?;
        Ok(())
    }

    fn delete_association(&mut self, id: ReservationId) -> StoreResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM slot_associations WHERE reservation_id = ?",
            [id.get()],
        )?;
        Ok(deleted == 1)
    }

    fn association_for(&self, id: ReservationId) -> StoreResult<Option<SlotNumber>> {
        let slot: Option<String> = self
            .conn
            .query_row(
                "SELECT slot_number FROM slot_associations WHERE reservation_id = ?",
                [id.get()],
                |row| row.get(0),
            )
            .optional()?;

        slot.map(|s| {
            s.parse()
                .map_err(|_| StoreError::corrupt("slot_associations", id, format!("bad slot '{}'", s)))
        })
        .transpose()
    }

    fn associations_for_slot(&self, slot: SlotNumber) -> StoreResult<Vec<ReservationId>> {
        let mut stmt = self.conn.prepare(
            "SELECT reservation_id FROM slot_associations WHERE slot_number = ? ORDER BY reservation_id",
        )?;
        let ids = stmt
            .query_map([slot.to_string()], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(ReservationId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn rebuild_associations(&mut self) -> StoreResult<usize> {
        self.conn.execute("DELETE FROM slot_associations", [])?;
        let written = self.conn.execute(
            r#"
            INSERT INTO slot_associations (reservation_id, slot_number)
            SELECT id, assigned_slot FROM reservations
            WHERE status = 'approved' AND assigned_slot IS NOT NULL
            "#,
            [],
        )?;
        debug!(associations = written, "Slot associations rebuilt");
        Ok(written)
    }

    fn upsert_vehicle_pass(&mut self, pass: &VehiclePass) -> StoreResult<bool> {
        let existed: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM vehicle_passes WHERE plate_number = ?)",
            [&pass.plate_number],
            |row| row.get(0),
        )?;

        self.conn.execute(
            r#"
            INSERT INTO vehicle_passes (plate_number, owner_name, owner_category, vehicle_type, valid_until)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(plate_number) DO UPDATE SET
                owner_name = excluded.owner_name,
                owner_category = excluded.owner_category,
                vehicle_type = excluded.vehicle_type,
                valid_until = excluded.valid_until
            "#,
            params![
                pass.plate_number,
                pass.owner_name,
                pass.owner_category.as_str(),
                pass.vehicle_type,
                pass.valid_until.format(DATE_FORMAT).to_string(),
            ],
        )?;
        Ok(!existed)
    }

    fn get_vehicle_pass(&self, plate_number: &str) -> StoreResult<Option<VehiclePass>> {
        let sql = format!("SELECT {} FROM vehicle_passes WHERE plate_number = ?", PASS_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [plate_number], PassRow::from_row)
            .optional()?;
        row.map(PassRow::decode).transpose()
    }

    fn list_vehicle_passes(&self) -> StoreResult<Vec<VehiclePass>> {
        let sql = format!("SELECT {} FROM vehicle_passes ORDER BY plate_number", PASS_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], PassRow::from_row)?;

        let mut passes = Vec::new();
        for row in rows {
            match row?.decode() {
                Ok(pass) => passes.push(pass),
                Err(e) => debug!(error = %e, "Skipping undecodable vehicle pass"),
            }
        }
        Ok(passes)
    }

    fn delete_vehicle_pass(&mut self, plate_number: &str) -> StoreResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM vehicle_passes WHERE plate_number = ?", [plate_number])?;
        Ok(deleted == 1)
    }

    fn append_audit(&mut self, event: &AuditEvent) -> StoreResult<()> {
        let event_json = serde_json::to_string(&event.event)?;

        self.conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        debug!(event_id = self.conn.last_insert_rowid(), kind = event.event.kind(), "Audit event appended");
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

/// Undecoded `parking_slots` row
struct SlotRow {
    slot_number: String,
    occupied: bool,
    vehicle_type: Option<String>,
    owner_name: Option<String>,
    plate_number: Option<String>,
    owner_category: Option<String>,
    contact_number: Option<String>,
}

impl SlotRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            slot_number: row.get(0)?,
            occupied: row.get(1)?,
            vehicle_type: row.get(2)?,
            owner_name: row.get(3)?,
            plate_number: row.get(4)?,
            owner_category: row.get(5)?,
            contact_number: row.get(6)?,
        })
    }

    fn decode(self) -> StoreResult<ParkingSlot> {
        let corrupt = |reason: String| StoreError::corrupt("parking_slots", &self.slot_number, reason);

        let slot_number: SlotNumber = self
            .slot_number
            .parse()
            .map_err(|_| corrupt("bad slot number".into()))?;

        if !self.occupied {
            return Ok(ParkingSlot::vacant(slot_number));
        }

        let owner_category: OwnerCategory = self
            .owner_category
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e: lotkeeper_util::LotkeeperError| corrupt(e.to_string()))?;

        let occupant = Occupant {
            vehicle_type: self.vehicle_type.clone().unwrap_or_default(),
            owner_name: self.owner_name.clone().unwrap_or_default(),
            plate_number: self.plate_number.clone().unwrap_or_default(),
            owner_category,
            contact_number: self.contact_number.clone().unwrap_or_default(),
        };
        Ok(ParkingSlot::occupied_by(slot_number, occupant))
    }
}

/// Undecoded `reservations` row
struct ReservationRow {
    id: i64,
    name: String,
    owner_category: String,
    email: String,
    contact_number: String,
    plate_number: String,
    vehicle_type: String,
    scheduled_date: String,
    scheduled_time: String,
    status: String,
    assigned_slot: Option<String>,
    is_late: bool,
    grace_period_until: Option<String>,
    created_at: String,
}

impl ReservationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            owner_category: row.get(2)?,
            email: row.get(3)?,
            contact_number: row.get(4)?,
            plate_number: row.get(5)?,
            vehicle_type: row.get(6)?,
            scheduled_date: row.get(7)?,
            scheduled_time: row.get(8)?,
            status: row.get(9)?,
            assigned_slot: row.get(10)?,
            is_late: row.get(11)?,
            grace_period_until: row.get(12)?,
            created_at: row.get(13)?,
        })
    }

    fn decode(self) -> StoreResult<Reservation> {
        let id = ReservationId::new(self.id);
        let corrupt = |reason: String| StoreError::corrupt("reservations", id, reason);

        let scheduled_date = NaiveDate::parse_from_str(&self.scheduled_date, DATE_FORMAT)
            .map_err(|e| corrupt(format!("scheduled_date '{}': {}", self.scheduled_date, e)))?;
        let scheduled_time = NaiveTime::parse_from_str(&self.scheduled_time, TIME_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&self.scheduled_time, "%H:%M:%S"))
            .map_err(|e| corrupt(format!("scheduled_time '{}': {}", self.scheduled_time, e)))?;
        let status: ReservationStatus = self
            .status
            .parse()
            .map_err(|_| corrupt(format!("status '{}'", self.status)))?;
        let owner_category: OwnerCategory = self
            .owner_category
            .parse()
            .map_err(|_| corrupt(format!("owner_category '{}'", self.owner_category)))?;
        let assigned_slot = self
            .assigned_slot
            .as_deref()
            .map(str::parse::<SlotNumber>)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;
        let grace_period_until = self
            .grace_period_until
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| corrupt(format!("grace_period_until: {}", e)))?;
        let created_at = parse_timestamp(&self.created_at)
            .map_err(|e| corrupt(format!("created_at: {}", e)))?;

        let reservation = Reservation {
            id,
            name: self.name,
            owner_category,
            email: self.email,
            contact_number: self.contact_number,
            plate_number: self.plate_number,
            vehicle_type: self.vehicle_type,
            scheduled_date,
            scheduled_time,
            status,
            assigned_slot,
            is_late: self.is_late,
            grace_period_until,
            created_at,
        };
        reservation.check_invariants().map_err(corrupt)?;
        Ok(reservation)
    }
}

/// Undecoded `vehicle_passes` row
struct PassRow {
    plate_number: String,
    owner_name: String,
    owner_category: String,
    vehicle_type: String,
    valid_until: String,
}

impl PassRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            plate_number: row.get(0)?,
            owner_name: row.get(1)?,
            owner_category: row.get(2)?,
            vehicle_type: row.get(3)?,
            valid_until: row.get(4)?,
        })
    }

    fn decode(self) -> StoreResult<VehiclePass> {
        let corrupt = |reason: String| StoreError::corrupt("vehicle_passes", &self.plate_number, reason);

        let owner_category: OwnerCategory = self
            .owner_category
            .parse()
            .map_err(|_| corrupt(format!("owner_category '{}'", self.owner_category)))?;
        let valid_until = NaiveDate::parse_from_str(&self.valid_until, DATE_FORMAT)
            .map_err(|e| corrupt(format!("valid_until '{}': {}", self.valid_until, e)))?;

        Ok(VehiclePass {
            plate_number: self.plate_number,
            owner_name: self.owner_name,
            owner_category,
            vehicle_type: self.vehicle_type,
            valid_until,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
