//! Late detection, grace period countdown, and expungement
//!
//! The decision for one reservation is a pure function of the row, its
//! scheduled instant, the current time, and the [`TimerRules`]. The engine
//! applies that decision to every APPROVED reservation on each tick, with
//! each mutation in its own transaction.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use lotkeeper_api::{Reservation, ReservationStatus, UpcomingReservation};
use lotkeeper_config::TimerSettings;
use lotkeeper_store::{AuditEvent, AuditEventType, Store, StoreError, StoreResult};
use lotkeeper_util::{FacilityClock, ReservationId, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{CoreEvent, ReservationStore};

/// Durations that drive the lifecycle clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRules {
    /// How long a late reservation keeps its slot
    pub grace_period: Duration,
    /// How far ahead a same-day reservation counts as upcoming
    pub upcoming_window: Duration,
}

impl From<&TimerSettings> for TimerRules {
    fn from(settings: &TimerSettings) -> Self {
        Self {
            grace_period: settings.grace_period,
            upcoming_window: settings.upcoming_window,
        }
    }
}

/// What should happen to one reservation right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    /// Nothing to do
    Idle,
    /// Starts later today within the upcoming window (display only)
    Upcoming { starts_in: Duration },
    /// Scheduled time has passed; start the grace period
    MarkLate { grace_until: DateTime<Utc> },
    /// Late, grace period still running
    InGrace { remaining: Duration },
    /// Grace period over; drop the binding
    Expunge,
}

fn to_std(d: chrono::Duration) -> Duration {
    d.to_std().unwrap_or(Duration::ZERO)
}

/// Decide what to do with `reservation` at `now`.
///
/// `scheduled` and `now` must both be facility-local so that "today" means
/// the facility's calendar day.
pub fn evaluate(
    reservation: &Reservation,
    scheduled: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
    rules: &TimerRules,
) -> TimerAction {
    if reservation.status != ReservationStatus::Approved {
        return TimerAction::Idle;
    }

    if reservation.is_late {
        return match reservation.grace_period_until {
            Some(until) if now >= until => TimerAction::Expunge,
            Some(until) => TimerAction::InGrace {
                remaining: to_std(until.signed_duration_since(now)),
            },
            None => TimerAction::Idle,
        };
    }

    if now >= scheduled {
        let grace = chrono::Duration::from_std(rules.grace_period).unwrap_or(chrono::Duration::zero());
        let grace_until = now.with_timezone(&Utc) + grace;
        return TimerAction::MarkLate { grace_until };
    }

    let starts_in = to_std(scheduled.signed_duration_since(now));
    if scheduled.date_naive() == now.date_naive() && starts_in <= rules.upcoming_window {
        return TimerAction::Upcoming { starts_in };
    }
    TimerAction::Idle
}

/// Result of a single tick
#[derive(Debug)]
pub enum TickOutcome {
    /// Another tick was still running
    Skipped,
    Completed(TickReport),
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub events: Vec<CoreEvent>,
    /// Approved reservations looked at
    pub evaluated: usize,
    /// Reservations that could not be evaluated and will be retried
    pub failed: usize,
}

#[derive(Debug, Default)]
struct Evaluation {
    event: Option<CoreEvent>,
    upcoming: Option<UpcomingReservation>,
}

#[derive(Debug, Default)]
struct TimerState {
    upcoming: Vec<UpcomingReservation>,
    /// Rows already reported as undecodable
    quarantined: HashSet<ReservationId>,
    last_sweep: Option<NaiveDate>,
}

/// Clears the in-flight flag when a tick ends, even on panic
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic evaluator for approved reservations
pub struct TimerEngine {
    store: Arc<dyn Store>,
    reservations: ReservationStore,
    clock: FacilityClock,
    rules: TimerRules,
    sweep_daily: bool,
    in_flight: AtomicBool,
    state: Mutex<TimerState>,
}

impl TimerEngine {
    pub fn new(
        store: Arc<dyn Store>,
        clock: FacilityClock,
        rules: TimerRules,
        sweep_daily: bool,
    ) -> Self {
        info!(
            grace_secs = rules.grace_period.as_secs(),
            upcoming_secs = rules.upcoming_window.as_secs(),
            sweep_daily,
            "Timer engine initialized"
        );
        Self {
            reservations: ReservationStore::new(store.clone(), clock),
            store,
            clock,
            rules,
            sweep_daily,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(TimerState::default()),
        }
    }

    pub fn rules(&self) -> TimerRules {
        self.rules
    }

    fn state(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Last computed upcoming set, soonest first
    pub fn upcoming(&self) -> Vec<UpcomingReservation> {
        self.state().upcoming.clone()
    }

    /// Record that the stale sweep already ran for `date`
    pub fn mark_swept(&self, date: NaiveDate) {
        self.state().last_sweep = Some(date);
    }

    /// Number of malformed reservations currently being skipped
    pub fn quarantined_count(&self) -> usize {
        self.state().quarantined.len()
    }

    pub fn is_ticking(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Evaluate every approved reservation at `now`.
    ///
    /// Returns [`TickOutcome::Skipped`] without doing anything if another
    /// tick is in flight.
    pub fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Tick already in flight, skipping");
            return TickOutcome::Skipped;
        }
        let _guard = FlightGuard(&self.in_flight);

        let mut report = TickReport::default();
        let local_now = self.clock.localize(now);

        if let Some(event) = self.sweep_if_new_day(local_now.date_naive()) {
            report.events.push(event);
        }

        let ids = match self.approved_ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not list approved reservations; retrying next tick");
                report.failed += 1;
                return TickOutcome::Completed(report);
            }
        };

        {
            let live: HashSet<ReservationId> = ids.iter().copied().collect();
            self.state().quarantined.retain(|id| live.contains(id));
        }

        let mut upcoming = Vec::new();
        for id in ids {
            report.evaluated += 1;
            match self.evaluate_in_tx(id, now) {
                Ok(evaluation) => {
                    if self.state().quarantined.remove(&id) {
                        info!(reservation_id = %id, "Malformed reservation is readable again");
                    }
                    report.events.extend(evaluation.event);
                    upcoming.extend(evaluation.upcoming);
                }
                Err(StoreError::Corrupt { reason, .. }) => {
                    report.failed += 1;
                    if self.state().quarantined.insert(id) {
                        warn!(reservation_id = %id, reason = %reason, "Skipping malformed reservation");
                    } else {
                        debug!(reservation_id = %id, "Still skipping malformed reservation");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(reservation_id = %id, error = %e, "Evaluation failed; retrying next tick");
                }
            }
        }

        upcoming.sort_by(|a, b| {
            (a.scheduled_at, a.reservation_id).cmp(&(b.scheduled_at, b.reservation_id))
        });
        if let Some(event) = self.replace_upcoming(upcoming) {
            report.events.push(event);
        }

        TickOutcome::Completed(report)
    }

    /// Evaluate one reservation in its own transaction.
    ///
    /// Returns the event for the transition applied, if any.
    pub fn evaluate_reservation(
        &self,
        id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Option<CoreEvent>> {
        Ok(self.evaluate_in_tx(id, now)?.event)
    }

    fn approved_ids(&self) -> StoreResult<Vec<ReservationId>> {
        let tx = self.store.begin()?;
        tx.reservation_ids_with_status(ReservationStatus::Approved)
    }

    fn evaluate_in_tx(&self, id: ReservationId, now: DateTime<Utc>) -> StoreResult<Evaluation> {
        let mut tx = self.store.begin()?;

        let Some(mut reservation) = tx.get_reservation(id)? else {
            return Ok(Evaluation::default());
        };
        let Some(slot) = reservation.assigned_slot else {
            return Ok(Evaluation::default());
        };

        let local_now = self.clock.localize(now);
        let scheduled = self
            .clock
            .scheduled_instant(reservation.scheduled_date, reservation.scheduled_time);

        match evaluate(&reservation, scheduled, local_now, &self.rules) {
            TimerAction::Idle | TimerAction::InGrace { .. } => Ok(Evaluation::default()),

            TimerAction::Upcoming { starts_in } => Ok(Evaluation {
                event: None,
                upcoming: Some(UpcomingReservation {
                    reservation_id: id,
                    slot_number: slot,
                    name: reservation.name,
                    plate_number: reservation.plate_number,
                    scheduled_at: scheduled,
                    starts_in,
                }),
            }),

            TimerAction::MarkLate { grace_until } => {
                reservation.is_late = true;
                reservation.grace_period_until = Some(grace_until);
                tx.update_reservation(&reservation)?;
                tx.append_audit(&AuditEvent::new(AuditEventType::ReservationLate {
                    reservation_id: id,
                    slot,
                    grace_period_until: grace_until,
                }))?;
                tx.commit()?;

                info!(
                    reservation_id = %id,
                    slot = %slot,
                    grace_until = %self.clock.localize(grace_until),
                    "Reservation is late"
                );
                Ok(Evaluation {
                    event: Some(CoreEvent::ReservationLate {
                        id,
                        slot,
                        grace_period_until: grace_until,
                    }),
                    upcoming: None,
                })
            }

            TimerAction::Expunge => {
                reservation.status = ReservationStatus::Expired;
                reservation.assigned_slot = None;
                reservation.is_late = false;
                reservation.grace_period_until = None;
                tx.update_reservation(&reservation)?;
                tx.delete_association(id)?;
                tx.append_audit(&AuditEvent::new(AuditEventType::ReservationExpunged {
                    reservation_id: id,
                    slot,
                }))?;
                tx.commit()?;

                info!(reservation_id = %id, slot = %slot, "Reservation expunged after grace period");
                Ok(Evaluation {
                    event: Some(CoreEvent::ReservationExpunged { id, slot }),
                    upcoming: None,
                })
            }
        }
    }

    fn sweep_if_new_day(&self, today: NaiveDate) -> Option<CoreEvent> {
        if !self.sweep_daily || self.state().last_sweep == Some(today) {
            return None;
        }

        match self.reservations.delete_stale(today) {
            Ok(removed) => {
                self.mark_swept(today);
                if removed.is_empty() {
                    return None;
                }
                Some(CoreEvent::StaleReservationsRemoved {
                    before: today,
                    removed,
                })
            }
            Err(e) => {
                warn!(error = %e, "Daily stale sweep failed; retrying next tick");
                None
            }
        }
    }

    fn replace_upcoming(&self, upcoming: Vec<UpcomingReservation>) -> Option<CoreEvent> {
        let mut state = self.state();

        let key = |list: &[UpcomingReservation]| {
            list.iter()
                .map(|u| (u.reservation_id, u.slot_number, u.scheduled_at))
                .collect::<Vec<_>>()
        };
        let changed = key(&state.upcoming) != key(&upcoming);
        state.upcoming = upcoming;

        if !changed {
            return None;
        }
        debug!(count = state.upcoming.len(), "Upcoming reservations changed");
        Some(CoreEvent::UpcomingChanged {
            upcoming: state.upcoming.clone(),
        })
    }
}
