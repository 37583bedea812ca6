//! Facility: the engines wired to one store and one clock

use chrono::{DateTime, Utc};
use lotkeeper_api::{HealthStatus, ReservationStatus, ServiceStateSnapshot, API_VERSION};
use lotkeeper_config::FacilityConfig;
use lotkeeper_store::{AuditEvent, AuditEventType, Store};
use lotkeeper_util::{FacilityClock, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    AssignmentService, CoreEvent, OccupancyEngine, PassRegistry, ReservationStore, TimerEngine,
    TimerRules,
};

/// Everything the daemon needs to serve one parking facility
pub struct Facility {
    pub occupancy: OccupancyEngine,
    pub passes: PassRegistry,
    pub reservations: ReservationStore,
    pub assignments: AssignmentService,
    pub timer: TimerEngine,
    store: Arc<dyn Store>,
    clock: FacilityClock,
}

impl Facility {
    pub fn new(store: Arc<dyn Store>, config: &FacilityConfig) -> Self {
        let clock = config.facility.clock();
        let universe = config.facility.slot_universe();
        let rules = TimerRules::from(&config.timer);

        info!(
            slots = universe.len(),
            utc_offset = %clock.offset(),
            require_vehicle_pass = config.facility.require_vehicle_pass,
            "Facility initialized"
        );

        let _ = store.append_audit(AuditEvent::new(AuditEventType::ConfigLoaded {
            slot_count: universe.len(),
            grace_period_secs: rules.grace_period.as_secs(),
        }));

        let mut occupancy = OccupancyEngine::new(store.clone(), universe);
        if config.facility.require_vehicle_pass {
            occupancy = occupancy.require_vehicle_pass(clock);
        }

        Self {
            occupancy,
            passes: PassRegistry::new(store.clone(), clock),
            reservations: ReservationStore::new(store.clone(), clock),
            assignments: AssignmentService::new(store.clone()),
            timer: TimerEngine::new(store.clone(), clock, rules, config.timer.sweep_stale_daily),
            store,
            clock,
        }
    }

    pub fn clock(&self) -> FacilityClock {
        self.clock
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Startup work before serving requests: create the slot universe,
    /// rebuild the slot index, and optionally drop reservations dated
    /// before today.
    pub fn prepare(&self, sweep_stale: bool) -> Result<Vec<CoreEvent>> {
        self.occupancy.initialize()?;
        self.reservations.rebuild_index()?;

        let mut events = Vec::new();
        if sweep_stale {
            let today = self.clock.today();
            let removed = self.reservations.delete_stale(today)?;
            self.timer.mark_swept(today);
            if !removed.is_empty() {
                events.push(CoreEvent::StaleReservationsRemoved {
                    before: today,
                    removed,
                });
            }
        }
        Ok(events)
    }

    /// Counts for status displays, as of `now`
    pub fn state_snapshot(&self, now: DateTime<Utc>) -> Result<ServiceStateSnapshot> {
        let slots = self.occupancy.list_slots()?;
        let reservations = self.reservations.list(None)?;

        let count = |status| reservations.iter().filter(|r| r.status == status).count();

        Ok(ServiceStateSnapshot {
            api_version: API_VERSION,
            facility_time: self.clock.localize(now),
            slot_count: slots.len(),
            occupied_count: slots.iter().filter(|s| s.occupied).count(),
            pending_count: count(ReservationStatus::Pending),
            approved_count: count(ReservationStatus::Approved),
            late_count: reservations.iter().filter(|r| r.is_late).count(),
            upcoming: self.timer.upcoming(),
        })
    }

    /// `timer_running` is reported by the caller, which owns the tick task
    pub fn health(&self, timer_running: bool) -> HealthStatus {
        let store_ok = self.store.is_healthy();
        if !store_ok {
            warn!("Store health check failed");
        }
        HealthStatus {
            live: true,
            ready: store_ok && timer_running,
            store_ok,
            timer_running,
        }
    }
}
