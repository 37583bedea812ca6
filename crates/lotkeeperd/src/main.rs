//! lotkeeperd - The lotkeeper parking service
//!
//! This is the main entry point for the lotkeeperd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization and startup maintenance
//! - Facility engines (occupancy, reservations, lifecycle)
//! - Timer task (late detection, grace period, expungement)
//! - IPC server

use anyhow::{Context, Result};
use clap::Parser;
use lotkeeper_api::{
    Command, ErrorCode, ErrorInfo, Event, EventPayload, Response, ResponsePayload,
};
use lotkeeper_config::load_config;
use lotkeeper_core::{CoreEvent, Facility, TickOutcome};
use lotkeeper_ipc::{IpcServer, ServerMessage};
use lotkeeper_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use lotkeeper_util::{database_path, default_config_path, ClientId, RateLimiter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Requests allowed per client per window
const RATE_LIMIT_REQUESTS: u32 = 30;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(1);

/// How often idle rate limiter buckets are dropped
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// lotkeeperd - Parking reservation and slot occupancy service
#[derive(Parser, Debug)]
#[command(name = "lotkeeperd")]
#[command(about = "Parking reservation and slot occupancy service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/lotkeeper/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set LOTKEEPER_SOCKET env var)
    #[arg(short, long, env = "LOTKEEPER_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set LOTKEEPER_DATA_DIR env var)
    #[arg(short, long, env = "LOTKEEPER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

/// Main service state
struct Service {
    facility: Arc<Facility>,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    rate_limiter: RateLimiter,
    tick_interval: Duration,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let config = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            slots = config.facility.slot_universe().len(),
            utc_offset = %config.facility.utc_offset,
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| config.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = database_path(&data_dir);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let facility = Facility::new(store.clone(), &config);
        let startup_events = facility
            .prepare(config.timer.sweep_stale_on_startup)
            .context("Startup maintenance failed")?;
        for event in &startup_events {
            debug!(event = ?event, "Startup event");
        }

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        Ok(Self {
            facility: Arc::new(facility),
            ipc: Arc::new(ipc),
            store,
            rate_limiter: RateLimiter::new(RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW),
            tick_interval: config.timer.tick_interval,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc_ref = self.ipc.clone();
        let mut ipc_messages = ipc_ref
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let facility = self.facility.clone();
        let store = self.store.clone();
        let rate_limiter = Arc::new(Mutex::new(self.rate_limiter));
        let timer_running = Arc::new(AtomicBool::new(false));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ipc_accept = ipc_ref.clone();
        let accept_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run(accept_shutdown).await {
                error!(error = %e, "IPC server error");
            }
        });

        let (timer_tx, mut timer_events) = mpsc::unbounded_channel();
        let timer_handle = spawn_timer(
            facility.clone(),
            self.tick_interval,
            timer_tx,
            shutdown_rx,
            timer_running.clone(),
        );

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                Some(event) = timer_events.recv() => {
                    broadcast_core_event(&ipc_ref, event);
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&facility, &ipc_ref, &store, &rate_limiter, &timer_running, msg).await;
                }

                _ = housekeeping.tick() => {
                    rate_limiter.lock().await.prune(HOUSEKEEPING_INTERVAL * 5);
                }
            }
        }

        info!("Shutting down lotkeeperd");

        // Let the in-flight tick finish; no new tick starts after this
        let _ = shutdown_tx.send(true);
        if let Err(e) = timer_handle.await {
            warn!(error = %e, "Timer task ended abnormally");
        }
        while let Ok(event) = timer_events.try_recv() {
            broadcast_core_event(&ipc_ref, event);
        }

        ipc_ref.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }

        ipc_ref.shutdown();
        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(
        facility: &Arc<Facility>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        rate_limiter: &Arc<Mutex<RateLimiter>>,
        timer_running: &AtomicBool,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                {
                    let mut limiter = rate_limiter.lock().await;
                    if !limiter.check(&client_id) {
                        let response = Response::error(
                            request.request_id,
                            ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                        );
                        let _ = ipc.send_response(&client_id, response).await;
                        return;
                    }
                }

                let running = timer_running.load(Ordering::Acquire);
                let facility = facility.clone();
                let request_id = request.request_id;
                let command = request.command;
                let command_client = client_id.clone();

                let outcome = tokio::task::spawn_blocking(move || {
                    handle_command(&facility, &command_client, running, command)
                })
                .await;

                let response = match outcome {
                    Ok(Ok((payload, events))) => {
                        for event in events {
                            broadcast_core_event(ipc, event);
                        }
                        Response::success(request_id, payload)
                    }
                    Ok(Err(e)) => {
                        debug!(client_id = %client_id, error = %e, "Command failed");
                        Response::error(request_id, ErrorInfo::from(&e))
                    }
                    Err(e) => {
                        error!(client_id = %client_id, error = %e, "Command handler panicked");
                        Response::error(
                            request_id,
                            ErrorInfo::new(ErrorCode::InternalError, "internal error"),
                        )
                    }
                };

                let _ = ipc.send_response(&client_id, response).await;
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(client_id = %client_id, uid = ?info.uid, "Client connected");

                let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientConnected {
                    client_id: client_id.to_string(),
                    uid: info.uid,
                }));
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientDisconnected {
                    client_id: client_id.to_string(),
                }));

                rate_limiter.lock().await.remove(&client_id);
            }
        }
    }
}

/// Run one command against the facility.
///
/// Returns the response payload and the events to broadcast.
fn handle_command(
    facility: &Facility,
    client_id: &ClientId,
    timer_running: bool,
    command: Command,
) -> lotkeeper_util::Result<(ResponsePayload, Vec<CoreEvent>)> {
    let now = lotkeeper_util::now();

    let result = match command {
        Command::GetState => (
            ResponsePayload::State(facility.state_snapshot(now)?),
            vec![],
        ),

        Command::GetHealth => (
            ResponsePayload::Health(facility.health(timer_running)),
            vec![],
        ),

        Command::ListSlots => (
            ResponsePayload::Slots {
                slots: facility.occupancy.list_slots()?,
            },
            vec![],
        ),

        Command::GetSlot { slot } => (
            ResponsePayload::Slot(facility.occupancy.get_slot(slot)?),
            vec![],
        ),

        Command::ListReservations { status } => (
            ResponsePayload::Reservations {
                reservations: facility.reservations.list(status)?,
            },
            vec![],
        ),

        Command::GetReservation { id } => (
            ResponsePayload::Reservation(facility.reservations.get(id)?),
            vec![],
        ),

        Command::FindNextForSlot { slot, after } => {
            let reference = after.unwrap_or_else(|| facility.clock().localize(now));
            (
                ResponsePayload::NextReservation {
                    reservation: facility.reservations.find_next_for_slot(slot, reference)?,
                },
                vec![],
            )
        }

        Command::SubmitReservation { request } => {
            let id = facility.reservations.create(&request)?;
            (
                ResponsePayload::Submitted { id },
                vec![CoreEvent::ReservationSubmitted { id }],
            )
        }

        Command::Accept { id, slot } => {
            let event = facility.assignments.accept(id, slot)?;
            (ResponsePayload::Approved { id, slot }, vec![event])
        }

        Command::Reject { id } => {
            let event = facility.assignments.reject(id)?;
            (ResponsePayload::Rejected { id }, vec![event])
        }

        Command::CancelApproved { id } => {
            let event = facility.assignments.cancel_approved(id)?;
            (ResponsePayload::Cancelled { id }, vec![event])
        }

        Command::ParkReservation { id } => {
            let events = facility.assignments.park_reservation_at(id, now)?;
            let slot = events.iter().find_map(|e| match e {
                CoreEvent::ReservationConsumed { slot, .. } => Some(*slot),
                _ => None,
            });
            match slot {
                Some(slot) => (ResponsePayload::ReservationParked { id, slot }, events),
                None => {
                    return Err(lotkeeper_util::LotkeeperError::storage(format!(
                        "reservation {} parked without a slot",
                        id
                    )));
                }
            }
        }

        Command::Park { slot, occupant } => {
            let event = facility.occupancy.park(slot, occupant)?;
            (ResponsePayload::Parked { slot }, vec![event])
        }

        Command::Unpark { slot } => {
            let event = facility.occupancy.unpark(slot)?;
            (ResponsePayload::Unparked { slot }, vec![event])
        }

        Command::DeleteReservation { id } => {
            facility.reservations.delete(id)?;
            (
                ResponsePayload::Deleted { id },
                vec![CoreEvent::ReservationDeleted { id }],
            )
        }

        Command::ListVehiclePasses => (
            ResponsePayload::VehiclePasses {
                passes: facility.passes.list()?,
            },
            vec![],
        ),

        Command::GetVehiclePass { plate_number } => (
            ResponsePayload::VehiclePass(facility.passes.get(&plate_number)?),
            vec![],
        ),

        Command::RegisterVehiclePass { pass } => (
            ResponsePayload::VehiclePass(facility.passes.register(pass)?),
            vec![],
        ),

        Command::RevokeVehiclePass { plate_number } => {
            facility.passes.revoke(&plate_number)?;
            (ResponsePayload::VehiclePassRevoked { plate_number }, vec![])
        }

        Command::SweepStale { before } => {
            let before = before.unwrap_or_else(|| facility.clock().localize(now).date_naive());
            let removed = facility.reservations.delete_stale(before)?;
            let events = if removed.is_empty() {
                vec![]
            } else {
                vec![CoreEvent::StaleReservationsRemoved {
                    before,
                    removed: removed.clone(),
                }]
            };
            (ResponsePayload::StaleRemoved { removed }, events)
        }

        Command::GetAuditLog { limit } => {
            let entries = facility
                .store()
                .get_recent_audits(limit)?
                .iter()
                .map(AuditEvent::to_record)
                .collect();
            (ResponsePayload::AuditLog { entries }, vec![])
        }

        Command::SubscribeEvents => (
            ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            },
            vec![],
        ),

        Command::UnsubscribeEvents => (ResponsePayload::Unsubscribed, vec![]),

        Command::Ping => (ResponsePayload::Pong, vec![]),
    };

    Ok(result)
}

fn broadcast_core_event(ipc: &IpcServer, event: CoreEvent) {
    debug!(event = ?event, "Broadcasting event");
    ipc.broadcast_event(Event::new(event.into()));
}

/// Tick the timer engine every `interval` until `shutdown` flips.
///
/// Each tick runs on the blocking pool and is awaited before the next
/// select, so a shutdown request never interrupts a tick.
fn spawn_timer(
    facility: Arc<Facility>,
    interval: Duration,
    events: mpsc::UnboundedSender<CoreEvent>,
    mut shutdown: watch::Receiver<bool>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        running.store(true, Ordering::Release);

        info!(interval_ms = interval.as_millis() as u64, "Timer engine running");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let tick_facility = facility.clone();
            let now = lotkeeper_util::now();
            match tokio::task::spawn_blocking(move || tick_facility.timer.tick(now)).await {
                Ok(TickOutcome::Completed(report)) => {
                    if report.failed > 0 {
                        debug!(
                            evaluated = report.evaluated,
                            failed = report.failed,
                            "Tick completed with failures"
                        );
                    }
                    for event in report.events {
                        let _ = events.send(event);
                    }
                }
                Ok(TickOutcome::Skipped) => {
                    debug!("Previous tick still running");
                }
                Err(e) => {
                    error!(error = %e, "Timer tick panicked");
                }
            }
        }

        running.store(false, Ordering::Release);
        info!("Timer engine stopped");
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "lotkeeperd starting"
    );

    let service = Service::new(&args).await?;
    service.run().await
}
