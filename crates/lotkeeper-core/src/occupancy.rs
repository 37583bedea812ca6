//! Slot registry and occupancy engine

use lotkeeper_api::{Occupant, ParkingSlot};
use lotkeeper_store::{AuditEvent, AuditEventType, Store};
use lotkeeper_util::{FacilityClock, LotkeeperError, Result, SlotNumber};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{check_pass, validate_occupant, CoreEvent};

/// Owns the fixed slot universe and who is parked where
#[derive(Clone)]
pub struct OccupancyEngine {
    store: Arc<dyn Store>,
    universe: Vec<SlotNumber>,
    /// Set when walk-ins need a vehicle pass valid on the facility's today
    pass_clock: Option<FacilityClock>,
}

impl OccupancyEngine {
    pub fn new(store: Arc<dyn Store>, universe: Vec<SlotNumber>) -> Self {
        Self {
            store,
            universe,
            pass_clock: None,
        }
    }

    /// Refuse walk-ins whose plate has no pass valid on `clock`'s today
    pub fn require_vehicle_pass(mut self, clock: FacilityClock) -> Self {
        self.pass_clock = Some(clock);
        self
    }

    pub fn requires_vehicle_pass(&self) -> bool {
        self.pass_clock.is_some()
    }

    /// Create the slot universe if the store has no slots yet.
    ///
    /// Returns the number of slots created; zero when already populated.
    pub fn initialize(&self) -> Result<usize> {
        let mut tx = self.store.begin()?;

        let existing = tx.slot_count()?;
        if existing > 0 {
            debug!(existing, "Slots already initialized");
            return Ok(0);
        }

        let mut created = 0;
        for slot in &self.universe {
            if tx.insert_slot(*slot)? {
                created += 1;
            }
        }
        tx.append_audit(&AuditEvent::new(AuditEventType::SlotsInitialized { created }))?;
        tx.commit()?;

        info!(created, "Slot universe initialized");
        Ok(created)
    }

    /// Park a walk-in vehicle in a vacant slot.
    ///
    /// When a vehicle pass is required, a plate without one valid today is
    /// refused with [`LotkeeperError::Conflict`] and the refusal is audited.
    pub fn park(&self, slot: SlotNumber, occupant: Occupant) -> Result<CoreEvent> {
        let occupant = validate_occupant(occupant)?;
        let mut tx = self.store.begin()?;

        let current = tx
            .get_slot(slot)?
            .ok_or_else(|| LotkeeperError::not_found(format!("slot {}", slot)))?;
        if current.occupied {
            return Err(LotkeeperError::conflict(format!(
                "slot {} is already occupied",
                slot
            )));
        }

        if let Some(clock) = self.pass_clock {
            match check_pass(&*tx, &occupant.plate_number, clock.today()) {
                Ok(_) => {}
                Err(denied @ LotkeeperError::Conflict(_)) => {
                    drop(tx);
                    warn!(
                        slot = %slot,
                        plate = %occupant.plate_number,
                        reason = %denied,
                        "Walk-in refused"
                    );
                    let _ = self.store.append_audit(AuditEvent::new(
                        AuditEventType::VehiclePassDenied {
                            slot,
                            plate_number: occupant.plate_number.clone(),
                            reason: denied.to_string(),
                        },
                    ));
                    return Err(denied);
                }
                Err(e) => return Err(e),
            }
        }

        tx.set_occupant(slot, Some(&occupant))?;
        tx.append_audit(&AuditEvent::new(AuditEventType::VehicleParked {
            slot,
            plate_number: occupant.plate_number.clone(),
        }))?;
        tx.commit()?;

        info!(slot = %slot, plate = %occupant.plate_number, "Vehicle parked");
        Ok(CoreEvent::SlotChanged(ParkingSlot::occupied_by(slot, occupant)))
    }

    /// Vacate an occupied slot, clearing every occupant field
    pub fn unpark(&self, slot: SlotNumber) -> Result<CoreEvent> {
        let mut tx = self.store.begin()?;

        let current = tx
            .get_slot(slot)?
            .ok_or_else(|| LotkeeperError::not_found(format!("slot {}", slot)))?;
        let Some(occupant) = current.occupant.filter(|_| current.occupied) else {
            return Err(LotkeeperError::conflict(format!("slot {} is vacant", slot)));
        };

        tx.set_occupant(slot, None)?;
        tx.append_audit(&AuditEvent::new(AuditEventType::VehicleUnparked {
            slot,
            plate_number: occupant.plate_number.clone(),
        }))?;
        tx.commit()?;

        info!(slot = %slot, plate = %occupant.plate_number, "Vehicle unparked");
        Ok(CoreEvent::SlotChanged(ParkingSlot::vacant(slot)))
    }

    pub fn get_slot(&self, slot: SlotNumber) -> Result<ParkingSlot> {
        let tx = self.store.begin()?;
        tx.get_slot(slot)?
            .ok_or_else(|| LotkeeperError::not_found(format!("slot {}", slot)))
    }

    /// Every slot, by row then letter
    pub fn list_slots(&self) -> Result<Vec<ParkingSlot>> {
        let tx = self.store.begin()?;
        Ok(tx.list_slots()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotkeeper_api::OwnerCategory;
    use lotkeeper_store::SqliteStore;

    fn engine() -> OccupancyEngine {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = OccupancyEngine::new(store, SlotNumber::universe(5, 5));
        engine.initialize().unwrap();
        engine
    }

    fn occupant(plate: &str) -> Occupant {
        Occupant {
            vehicle_type: "Sedan".into(),
            owner_name: "Ana Cruz".into(),
            plate_number: plate.into(),
            owner_category: OwnerCategory::Student,
            contact_number: "09171234567".into(),
        }
    }

    fn slot(s: &str) -> SlotNumber {
        s.parse().unwrap()
    }

    #[test]
    fn initialize_is_idempotent() {
        let engine = engine();
        assert_eq!(engine.initialize().unwrap(), 0);

        let slots = engine.list_slots().unwrap();
        assert_eq!(slots.len(), 25);
        assert_eq!(slots[0].slot_number, slot("1A"));
        assert_eq!(slots[24].slot_number, slot("5E"));
        assert!(slots.iter().all(|s| !s.occupied && s.occupant.is_none()));
    }

    #[test]
    fn park_unpark_round_trip_clears_occupant() {
        let engine = engine();

        let event = engine.park(slot("1A"), occupant("abc 1234")).unwrap();
        match event {
            CoreEvent::SlotChanged(s) => {
                assert!(s.occupied);
                assert_eq!(s.occupant.unwrap().plate_number, "ABC 1234");
            }
            other => panic!("unexpected event {:?}", other),
        }

        engine.unpark(slot("1A")).unwrap();
        let vacated = engine.get_slot(slot("1A")).unwrap();
        assert!(!vacated.occupied);
        assert!(vacated.occupant.is_none());
    }

    #[test]
    fn park_on_occupied_slot_keeps_original() {
        let engine = engine();
        engine.park(slot("2C"), occupant("AAA 1111")).unwrap();

        let err = engine.park(slot("2C"), occupant("BBB 2222")).unwrap_err();
        assert!(matches!(err, LotkeeperError::Conflict(_)));

        let current = engine.get_slot(slot("2C")).unwrap();
        assert_eq!(current.occupant.unwrap().plate_number, "AAA 1111");
    }

    #[test]
    fn unpark_vacant_slot_conflicts() {
        let engine = engine();
        assert!(matches!(
            engine.unpark(slot("3A")),
            Err(LotkeeperError::Conflict(_))
        ));
    }

    #[test]
    fn unknown_slot_is_not_found() {
        let engine = engine();
        assert!(matches!(
            engine.get_slot(slot("9Z")),
            Err(LotkeeperError::NotFound(_))
        ));
        assert!(matches!(
            engine.park(slot("9Z"), occupant("ABC 1234")),
            Err(LotkeeperError::NotFound(_))
        ));
    }

    #[test]
    fn pass_required_for_walk_in() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = FacilityClock::default();
        let engine = OccupancyEngine::new(store.clone(), SlotNumber::universe(5, 5))
            .require_vehicle_pass(clock);
        engine.initialize().unwrap();
        assert!(engine.requires_vehicle_pass());

        let passes = crate::PassRegistry::new(store.clone(), clock);
        let today = clock.today();
        passes
            .register(lotkeeper_api::VehiclePass {
                plate_number: "ABC 1234".into(),
                owner_name: "Ana Cruz".into(),
                owner_category: OwnerCategory::Student,
                vehicle_type: "Sedan".into(),
                valid_until: today,
            })
            .unwrap();

        let err = engine.park(slot("1A"), occupant("ZZZ 9999")).unwrap_err();
        assert!(matches!(err, LotkeeperError::Conflict(_)));
        assert!(!engine.get_slot(slot("1A")).unwrap().occupied);

        let denied = store.get_recent_audits(1).unwrap();
        assert!(matches!(
            &denied[0].event,
            AuditEventType::VehiclePassDenied { plate_number, .. } if plate_number == "ZZZ 9999"
        ));

        engine.park(slot("1A"), occupant("abc 1234")).unwrap();
        assert!(engine.get_slot(slot("1A")).unwrap().occupied);
    }

    #[test]
    fn expired_pass_is_refused() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = FacilityClock::default();
        let engine = OccupancyEngine::new(store.clone(), SlotNumber::universe(2, 2))
            .require_vehicle_pass(clock);
        engine.initialize().unwrap();

        // registration refuses a past date, so write the lapsed pass directly
        let mut tx = store.begin().unwrap();
        tx.upsert_vehicle_pass(&lotkeeper_api::VehiclePass {
            plate_number: "OLD 0001".into(),
            owner_name: "Ben Reyes".into(),
            owner_category: OwnerCategory::Staff,
            vehicle_type: "Van".into(),
            valid_until: clock.today() - chrono::Duration::days(1),
        })
        .unwrap();
        tx.commit().unwrap();

        let err = engine.park(slot("2B"), occupant("OLD 0001")).unwrap_err();
        assert!(matches!(&err, LotkeeperError::Conflict(msg) if msg.contains("expired")));
        assert!(!engine.get_slot(slot("2B")).unwrap().occupied);
    }

    #[test]
    fn invalid_occupant_is_rejected_before_write() {
        let engine = engine();
        assert!(matches!(
            engine.park(slot("1B"), occupant("not a plate")),
            Err(LotkeeperError::Validation(_))
        ));
        assert!(!engine.get_slot(slot("1B")).unwrap().occupied);
    }
}
