//! Integration tests for lotkeeperd
//!
//! These tests verify the end-to-end behavior of the facility engines and
//! of the daemon over its socket.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lotkeeper_api::{
    Command, ErrorCode, EventPayload, OwnerCategory, ReservationRequest, ReservationStatus,
    ResponsePayload, ResponseResult,
};
use lotkeeper_config::{parse_config, FacilityConfig};
use lotkeeper_core::{CoreEvent, Facility, TickOutcome, TickReport};
use lotkeeper_ipc::{EventStream, IpcClient};
use lotkeeper_store::{AuditEventType, SqliteStore, Store};
use lotkeeper_util::{database_path, LotkeeperError, ReservationId, SlotNumber};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tempfile::tempdir;
use tokio::time::timeout;

fn make_test_config() -> FacilityConfig {
    parse_config(
        r#"
config_version = 1

[facility]
utc_offset = "+08:00"
rows = 5
letters = 5

[timer]
grace_period_minutes = 15
sweep_stale_on_startup = false
sweep_stale_daily = false
"#,
    )
    .unwrap()
}

fn make_facility() -> Facility {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let facility = Facility::new(store, &make_test_config());
    facility.prepare(false).unwrap();
    facility
}

fn request(date: &str, time: &str, plate: &str) -> ReservationRequest {
    ReservationRequest {
        name: "Dana Lim".into(),
        owner_category: "staff".into(),
        email: "dana.lim@example.edu".into(),
        contact_number: "09181112222".into(),
        plate_number: plate.into(),
        vehicle_type: "Hatchback".into(),
        date: date.into(),
        time: time.into(),
    }
}

fn slot(s: &str) -> SlotNumber {
    s.parse().unwrap()
}

/// 2025-06-01 at the given facility-local (+08:00) time
fn local(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(8 * 3600)
        .unwrap()
        .with_ymd_and_hms(2025, 6, 1, h, m, s)
        .unwrap()
}

fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    local(h, m, s).with_timezone(&Utc)
}

fn completed(outcome: TickOutcome) -> TickReport {
    match outcome {
        TickOutcome::Completed(report) => report,
        TickOutcome::Skipped => panic!("tick was skipped"),
    }
}

fn assert_binding_invariant(facility: &Facility) {
    for r in facility.reservations.list(None).unwrap() {
        assert_eq!(
            r.assigned_slot.is_some(),
            r.status == ReservationStatus::Approved,
            "reservation {} has status {} and slot {:?}",
            r.id,
            r.status,
            r.assigned_slot
        );
        assert!(r.check_invariants().is_ok());
    }
}

#[test]
fn test_config_defaults() {
    let config = make_test_config();
    assert_eq!(config.facility.slot_universe().len(), 25);
    assert_eq!(config.timer.grace_period, Duration::from_secs(15 * 60));
    assert_eq!(config.timer.tick_interval, Duration::from_secs(1));
}

#[test]
fn test_full_reservation_scenario() {
    let facility = make_facility();

    let id = facility
        .reservations
        .create(&request("2025-06-01", "10:00", "abc 1234"))
        .unwrap();
    assert_eq!(
        facility.reservations.get(id).unwrap().status,
        ReservationStatus::Pending
    );

    let event = facility.assignments.accept(id, slot("1A")).unwrap();
    assert_eq!(
        event,
        CoreEvent::ReservationApproved {
            id,
            slot: slot("1A")
        }
    );
    let next = facility
        .reservations
        .find_next_for_slot(slot("1A"), local(9, 0, 0))
        .unwrap();
    assert_eq!(next.map(|r| r.id), Some(id));

    let events = facility.assignments.park_reservation(id).unwrap();
    assert!(events.contains(&CoreEvent::ReservationConsumed {
        id,
        slot: slot("1A")
    }));

    let parked = facility.occupancy.get_slot(slot("1A")).unwrap();
    assert!(parked.occupied);
    let occupant = parked.occupant.unwrap();
    assert_eq!(occupant.plate_number, "ABC 1234");
    assert_eq!(occupant.owner_name, "Dana Lim");
    assert_eq!(occupant.owner_category, OwnerCategory::Staff);

    assert!(matches!(
        facility.reservations.get(id),
        Err(LotkeeperError::NotFound(_))
    ));
    assert!(facility
        .reservations
        .find_next_for_slot(slot("1A"), local(9, 0, 0))
        .unwrap()
        .is_none());

    facility.occupancy.unpark(slot("1A")).unwrap();
    let vacated = facility.occupancy.get_slot(slot("1A")).unwrap();
    assert!(!vacated.occupied && vacated.occupant.is_none());
}

#[test]
fn test_lifecycle_keeps_binding_invariant() {
    let facility = make_facility();

    let a = facility.reservations.create(&request("2025-06-01", "10:00", "AAA 1111")).unwrap();
    let b = facility.reservations.create(&request("2025-06-01", "11:00", "BBB 2222")).unwrap();
    let c = facility.reservations.create(&request("2025-06-01", "12:00", "CCC 3333")).unwrap();
    let d = facility.reservations.create(&request("2025-06-01", "13:00", "DDD 4444")).unwrap();
    assert_binding_invariant(&facility);

    facility.assignments.accept(a, slot("1A")).unwrap();
    facility.assignments.accept(b, slot("1B")).unwrap();
    facility.assignments.reject(c).unwrap();
    assert_binding_invariant(&facility);

    facility.assignments.cancel_approved(b).unwrap();
    assert_eq!(
        facility.reservations.get(b).unwrap().status,
        ReservationStatus::Cancelled
    );
    assert_binding_invariant(&facility);

    // Accept only works from PENDING and leaves the row untouched otherwise
    for id in [a, b, c] {
        let before = facility.reservations.get(id).unwrap();
        assert!(matches!(
            facility.assignments.accept(id, slot("2A")),
            Err(LotkeeperError::Conflict(_))
        ));
        assert_eq!(facility.reservations.get(id).unwrap(), before);
    }

    completed(facility.timer.tick(utc(10, 0, 1)));
    completed(facility.timer.tick(utc(10, 15, 1)));
    assert_eq!(
        facility.reservations.get(a).unwrap().status,
        ReservationStatus::Expired
    );
    assert_binding_invariant(&facility);

    facility.assignments.accept(d, slot("1A")).unwrap();
    assert_binding_invariant(&facility);
}

#[test]
fn test_late_then_expunged_once() {
    let facility = make_facility();
    let id = facility
        .reservations
        .create(&request("2025-06-01", "10:00", "LTE 0001"))
        .unwrap();
    facility.assignments.accept(id, slot("3C")).unwrap();

    let report = completed(facility.timer.tick(utc(9, 59, 59)));
    assert!(report
        .events
        .iter()
        .all(|e| !matches!(e, CoreEvent::ReservationLate { .. })));

    let report = completed(facility.timer.tick(utc(10, 0, 1)));
    assert!(report.events.contains(&CoreEvent::ReservationLate {
        id,
        slot: slot("3C"),
        grace_period_until: utc(10, 15, 1),
    }));

    completed(facility.timer.tick(utc(10, 5, 0)));
    let reservation = facility.reservations.get(id).unwrap();
    assert!(reservation.is_late);
    assert_eq!(reservation.grace_period_until, Some(utc(10, 15, 1)));

    let first = completed(facility.timer.tick(utc(10, 15, 2)));
    let second = completed(facility.timer.tick(utc(10, 15, 3)));
    let expunged = |report: &TickReport| {
        report
            .events
            .iter()
            .filter(|e| matches!(e, CoreEvent::ReservationExpunged { .. }))
            .count()
    };
    assert_eq!(expunged(&first), 1);
    assert_eq!(expunged(&second), 0);

    let reservation = facility.reservations.get(id).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Expired);
    assert!(reservation.assigned_slot.is_none());
    assert!(facility
        .reservations
        .find_next_for_slot(slot("3C"), local(0, 0, 0))
        .unwrap()
        .is_none());
}

#[test]
fn test_stale_sweep_ignores_status() {
    let facility = make_facility();
    let pending = facility.reservations.create(&request("2025-06-01", "08:00", "STL 0001")).unwrap();
    let approved = facility.reservations.create(&request("2025-06-01", "09:00", "STL 0002")).unwrap();
    let kept = facility.reservations.create(&request("2025-06-02", "09:00", "STL 0003")).unwrap();
    facility.assignments.accept(approved, slot("4D")).unwrap();

    let removed = facility
        .reservations
        .delete_stale(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap())
        .unwrap();
    assert_eq!(removed, vec![pending, approved]);

    let remaining: Vec<ReservationId> = facility
        .reservations
        .list(None)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(remaining, vec![kept]);

    let audits = facility.store().get_recent_audits(5).unwrap();
    assert!(audits.iter().any(|e| matches!(
        &e.event,
        AuditEventType::StaleReservationsRemoved { removed, .. } if removed.len() == 2
    )));
}

#[test]
fn test_concurrent_accept_has_one_winner() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lotkeeper.db");
    let config = make_test_config();

    let first = Facility::new(Arc::new(SqliteStore::open(&path).unwrap()), &config);
    first.prepare(false).unwrap();
    let second = Facility::new(Arc::new(SqliteStore::open(&path).unwrap()), &config);

    let id = first
        .reservations
        .create(&request("2025-06-01", "10:00", "RCE 0001"))
        .unwrap();

    let barrier = Barrier::new(2);
    let results: Vec<_> = std::thread::scope(|scope| {
        let handles = [(&first, "1A"), (&second, "1B")].map(|(facility, s)| {
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                facility.assignments.accept(id, slot(s))
            })
        });
        handles.map(|h| h.join().unwrap()).into_iter().collect()
    });

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(LotkeeperError::Conflict(_))))
        .count();
    assert_eq!((wins, conflicts), (1, 1));

    let reservation = second.reservations.get(id).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Approved);
    assert!(reservation.assigned_slot.is_some());
}

// Daemon over its socket

/// Kills the daemon if a test fails before shutting it down
struct Daemon {
    child: Option<Child>,
    socket: PathBuf,
    data_dir: PathBuf,
}

impl Daemon {
    fn spawn(dir: &Path, config: &str, mock_time: Option<&str>) -> Self {
        let socket = dir.join("run").join("lotkeeperd.sock");
        let data_dir = dir.join("data");
        let config_path = dir.join("config.toml");
        std::fs::write(&config_path, config).unwrap();

        let mut command = std::process::Command::new(env!("CARGO_BIN_EXE_lotkeeperd"));
        command
            .arg("--config")
            .arg(&config_path)
            .arg("--socket")
            .arg(&socket)
            .arg("--data-dir")
            .arg(&data_dir)
            .env("RUST_LOG", "warn")
            .env_remove("LOTKEEPER_MOCK_TIME");
        if let Some(mock) = mock_time {
            command.env("LOTKEEPER_MOCK_TIME", mock);
        }

        Self {
            child: Some(command.spawn().unwrap()),
            socket,
            data_dir,
        }
    }

    async fn connect(&self) -> IpcClient {
        for _ in 0..100 {
            if let Ok(client) = IpcClient::connect(&self.socket).await {
                return client;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("lotkeeperd did not start listening on {:?}", self.socket);
    }

    async fn terminate(mut self) -> ExitStatus {
        let mut child = self.child.take().unwrap();
        nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(child.id() as i32),
            nix::sys::signal::Signal::SIGTERM,
        )
        .unwrap();

        tokio::task::spawn_blocking(move || child.wait().unwrap())
            .await
            .unwrap()
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

async fn next_matching(
    events: &mut EventStream,
    mut pred: impl FnMut(&EventPayload) -> bool,
) -> EventPayload {
    timeout(Duration::from_secs(10), async {
        loop {
            let event = events.next().await.unwrap();
            if pred(&event.payload) {
                return event.payload;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

const DAEMON_CONFIG: &str = r#"
config_version = 1

[timer]
tick_interval_ms = 100
sweep_stale_on_startup = false
sweep_stale_daily = false
"#;

#[tokio::test]
async fn test_daemon_serves_reservation_lifecycle() {
    let dir = tempdir().unwrap();
    let daemon = Daemon::spawn(dir.path(), DAEMON_CONFIG, None);

    let mut events = daemon.connect().await.subscribe().await.unwrap();
    let mut client = daemon.connect().await;

    assert!(matches!(
        client.call(Command::Ping).await.unwrap(),
        ResponsePayload::Pong
    ));

    let id = match client
        .call(Command::SubmitReservation {
            request: request("2999-01-01", "08:00", "e2e 0001"),
        })
        .await
        .unwrap()
    {
        ResponsePayload::Submitted { id } => id,
        other => panic!("unexpected payload {:?}", other),
    };

    client
        .call(Command::Accept { id, slot: slot("2B") })
        .await
        .unwrap();
    let approved = next_matching(&mut events, |p| {
        matches!(p, EventPayload::ReservationApproved { .. })
    })
    .await;
    assert!(matches!(
        approved,
        EventPayload::ReservationApproved { id: got, .. } if got == id
    ));

    // Second accept on the same row is a conflict
    let response = client
        .send(Command::Accept { id, slot: slot("2C") })
        .await
        .unwrap();
    match response.result {
        ResponseResult::Err(e) => assert_eq!(e.code, ErrorCode::Conflict),
        other => panic!("expected conflict, got {:?}", other),
    }

    match client.call(Command::ParkReservation { id }).await.unwrap() {
        ResponsePayload::ReservationParked { slot: parked, .. } => assert_eq!(parked, slot("2B")),
        other => panic!("unexpected payload {:?}", other),
    }
    next_matching(&mut events, |p| {
        matches!(p, EventPayload::SlotChanged(s) if s.slot_number == slot("2B") && s.occupied)
    })
    .await;

    match client.call(Command::GetSlot { slot: slot("2B") }).await.unwrap() {
        ResponsePayload::Slot(s) => {
            assert_eq!(s.occupant.unwrap().plate_number, "E2E 0001");
        }
        other => panic!("unexpected payload {:?}", other),
    }

    let response = client.send(Command::GetReservation { id }).await.unwrap();
    match response.result {
        ResponseResult::Err(e) => assert_eq!(e.code, ErrorCode::NotFound),
        other => panic!("expected not found, got {:?}", other),
    }

    match client.call(Command::GetState).await.unwrap() {
        ResponsePayload::State(state) => {
            assert_eq!(state.slot_count, 25);
            assert_eq!(state.occupied_count, 1);
        }
        other => panic!("unexpected payload {:?}", other),
    }

    match client.call(Command::GetHealth).await.unwrap() {
        ResponsePayload::Health(health) => assert!(health.live && health.store_ok),
        other => panic!("unexpected payload {:?}", other),
    }

    match client.call(Command::GetAuditLog { limit: 3 }).await.unwrap() {
        ResponsePayload::AuditLog { entries } => {
            assert_eq!(entries.len(), 3);
            assert!(entries.windows(2).all(|w| w[0].id > w[1].id));
        }
        other => panic!("unexpected payload {:?}", other),
    }

    drop(client);
    let data_dir = daemon.data_dir.clone();
    let status = daemon.terminate().await;
    assert!(status.success(), "lotkeeperd exited with {:?}", status);

    let store = SqliteStore::open(database_path(&data_dir)).unwrap();
    let audits = store.get_recent_audits(100).unwrap();
    for expected in ["service_started", "service_stopped", "reservation_approved", "reservation_consumed"] {
        assert!(
            audits.iter().any(|e| e.event.kind() == expected),
            "missing audit entry {}",
            expected
        );
    }
    assert!(audits
        .iter()
        .any(|e| matches!(e.event, AuditEventType::ClientConnected { .. })));
}

#[tokio::test]
async fn test_daemon_timer_marks_late() {
    let dir = tempdir().unwrap();
    // 09:59:58 at +08:00
    let daemon = Daemon::spawn(dir.path(), DAEMON_CONFIG, Some("2025-06-01 01:59:58"));

    let mut events = daemon.connect().await.subscribe().await.unwrap();
    let mut client = daemon.connect().await;

    let id = match client
        .call(Command::SubmitReservation {
            request: request("2025-06-01", "10:00", "LTE 7777"),
        })
        .await
        .unwrap()
    {
        ResponsePayload::Submitted { id } => id,
        other => panic!("unexpected payload {:?}", other),
    };
    client
        .call(Command::Accept { id, slot: slot("5E") })
        .await
        .unwrap();

    let late = next_matching(&mut events, |p| matches!(p, EventPayload::ReservationLate { .. })).await;
    match late {
        EventPayload::ReservationLate {
            id: got,
            slot: late_slot,
            grace_period_until,
        } => {
            assert_eq!(got, id);
            assert_eq!(late_slot, slot("5E"));
            assert!(grace_period_until >= utc(10, 15, 0));
        }
        other => panic!("unexpected event {:?}", other),
    }

    match client.call(Command::GetReservation { id }).await.unwrap() {
        ResponsePayload::Reservation(r) => {
            assert!(r.is_late);
            assert_eq!(r.status, ReservationStatus::Approved);
        }
        other => panic!("unexpected payload {:?}", other),
    }

    drop(client);
    assert!(daemon.terminate().await.success());
}

const GATED_CONFIG: &str = r#"
config_version = 1

[facility]
require_vehicle_pass = true

[timer]
tick_interval_ms = 100
sweep_stale_on_startup = false
sweep_stale_daily = false
"#;

fn error_code(response: lotkeeper_api::Response) -> ErrorCode {
    match response.result {
        ResponseResult::Err(e) => e.code,
        other => panic!("expected an error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_daemon_deletes_and_gates_walk_ins() {
    let dir = tempdir().unwrap();
    let daemon = Daemon::spawn(dir.path(), GATED_CONFIG, None);

    let mut events = daemon.connect().await.subscribe().await.unwrap();
    let mut client = daemon.connect().await;

    let id = match client
        .call(Command::SubmitReservation {
            request: request("2999-01-01", "08:00", "DEL 0001"),
        })
        .await
        .unwrap()
    {
        ResponsePayload::Submitted { id } => id,
        other => panic!("unexpected payload {:?}", other),
    };
    client
        .call(Command::Accept { id, slot: slot("3A") })
        .await
        .unwrap();

    match client.call(Command::DeleteReservation { id }).await.unwrap() {
        ResponsePayload::Deleted { id: got } => assert_eq!(got, id),
        other => panic!("unexpected payload {:?}", other),
    }
    next_matching(&mut events, |p| {
        matches!(p, EventPayload::ReservationDeleted { id: got } if *got == id)
    })
    .await;
    assert_eq!(
        error_code(client.send(Command::GetReservation { id }).await.unwrap()),
        ErrorCode::NotFound
    );
    assert_eq!(
        error_code(client.send(Command::DeleteReservation { id }).await.unwrap()),
        ErrorCode::NotFound
    );

    let walk_in = lotkeeper_api::Occupant {
        vehicle_type: "Van".into(),
        owner_name: "Cy Tan".into(),
        plate_number: "VAN 0001".into(),
        owner_category: OwnerCategory::Visitor,
        contact_number: "09170000000".into(),
    };
    assert_eq!(
        error_code(
            client
                .send(Command::Park {
                    slot: slot("3A"),
                    occupant: walk_in.clone(),
                })
                .await
                .unwrap()
        ),
        ErrorCode::Conflict
    );

    let pass = lotkeeper_api::VehiclePass {
        plate_number: "van 0001".into(),
        owner_name: "Cy Tan".into(),
        owner_category: OwnerCategory::Visitor,
        vehicle_type: "Van".into(),
        valid_until: NaiveDate::from_ymd_opt(2999, 12, 31).unwrap(),
    };
    match client
        .call(Command::RegisterVehiclePass { pass })
        .await
        .unwrap()
    {
        ResponsePayload::VehiclePass(stored) => assert_eq!(stored.plate_number, "VAN 0001"),
        other => panic!("unexpected payload {:?}", other),
    }
    match client.call(Command::ListVehiclePasses).await.unwrap() {
        ResponsePayload::VehiclePasses { passes } => assert_eq!(passes.len(), 1),
        other => panic!("unexpected payload {:?}", other),
    }

    client
        .call(Command::Park {
            slot: slot("3A"),
            occupant: walk_in,
        })
        .await
        .unwrap();
    client.call(Command::Unpark { slot: slot("3A") }).await.unwrap();

    match client
        .call(Command::RevokeVehiclePass {
            plate_number: "VAN 0001".into(),
        })
        .await
        .unwrap()
    {
        ResponsePayload::VehiclePassRevoked { plate_number } => assert_eq!(plate_number, "VAN 0001"),
        other => panic!("unexpected payload {:?}", other),
    }
    assert_eq!(
        error_code(
            client
                .send(Command::GetVehiclePass {
                    plate_number: "VAN 0001".into(),
                })
                .await
                .unwrap()
        ),
        ErrorCode::NotFound
    );

    drop(client);
    let data_dir = daemon.data_dir.clone();
    assert!(daemon.terminate().await.success());

    let store = SqliteStore::open(database_path(&data_dir)).unwrap();
    let audits = store.get_recent_audits(100).unwrap();
    for expected in [
        "reservation_deleted",
        "vehicle_pass_denied",
        "vehicle_pass_registered",
        "vehicle_pass_revoked",
    ] {
        assert!(
            audits.iter().any(|e| e.event.kind() == expected),
            "missing audit entry {}",
            expected
        );
    }
}

#[test]
fn test_daemon_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let mut daemon = Daemon::spawn(
        dir.path(),
        "config_version = 1\n[facility]\nrows = 0\n",
        None,
    );

    let status = daemon.child.take().unwrap().wait().unwrap();
    assert!(!status.success());
}
