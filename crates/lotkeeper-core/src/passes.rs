//! Vehicle pass registry for walk-in parking

use chrono::NaiveDate;
use lotkeeper_api::VehiclePass;
use lotkeeper_store::{AuditEvent, AuditEventType, Store, StoreTx};
use lotkeeper_util::{format_display_date, FacilityClock, LotkeeperError, Result};
use std::sync::Arc;
use tracing::info;

use crate::{normalize_plate, validate_pass};

/// Look up the pass for `plate_number` and require it to cover `today`.
///
/// A missing or expired pass is a [`LotkeeperError::Conflict`].
pub fn check_pass(tx: &dyn StoreTx, plate_number: &str, today: NaiveDate) -> Result<VehiclePass> {
    let pass = tx.get_vehicle_pass(plate_number)?.ok_or_else(|| {
        LotkeeperError::conflict(format!("vehicle {} has no registered pass", plate_number))
    })?;

    if !pass.is_valid_on(today) {
        return Err(LotkeeperError::conflict(format!(
            "vehicle pass for {} expired on {}",
            plate_number,
            format_display_date(pass.valid_until)
        )));
    }
    Ok(pass)
}

/// Registered vehicles and how long their passes last
#[derive(Clone)]
pub struct PassRegistry {
    store: Arc<dyn Store>,
    clock: FacilityClock,
}

impl PassRegistry {
    pub fn new(store: Arc<dyn Store>, clock: FacilityClock) -> Self {
        Self { store, clock }
    }

    /// Create or renew the pass for a plate.
    ///
    /// A pass that would already be expired today is refused.
    pub fn register(&self, pass: VehiclePass) -> Result<VehiclePass> {
        let pass = validate_pass(pass)?;
        let today = self.clock.today();
        if !pass.is_valid_on(today) {
            return Err(LotkeeperError::validation(format!(
                "pass for {} would already be expired (valid until {})",
                pass.plate_number,
                format_display_date(pass.valid_until)
            )));
        }

        let mut tx = self.store.begin()?;
        let created = tx.upsert_vehicle_pass(&pass)?;
        tx.append_audit(&AuditEvent::new(AuditEventType::VehiclePassRegistered {
            plate_number: pass.plate_number.clone(),
            valid_until: pass.valid_until,
        }))?;
        tx.commit()?;

        info!(
            plate = %pass.plate_number,
            owner = %pass.owner_name,
            valid_until = %pass.valid_until,
            created,
            "Vehicle pass registered"
        );
        Ok(pass)
    }

    pub fn revoke(&self, plate_number: &str) -> Result<()> {
        let plate = normalize_plate(plate_number)?;

        let mut tx = self.store.begin()?;
        if !tx.delete_vehicle_pass(&plate)? {
            return Err(LotkeeperError::not_found(format!("vehicle pass {}", plate)));
        }
        tx.append_audit(&AuditEvent::new(AuditEventType::VehiclePassRevoked {
            plate_number: plate.clone(),
        }))?;
        tx.commit()?;

        info!(plate = %plate, "Vehicle pass revoked");
        Ok(())
    }

    pub fn get(&self, plate_number: &str) -> Result<VehiclePass> {
        let plate = normalize_plate(plate_number)?;
        let tx = self.store.begin()?;
        tx.get_vehicle_pass(&plate)?
            .ok_or_else(|| LotkeeperError::not_found(format!("vehicle pass {}", plate)))
    }

    /// Every pass, by plate
    pub fn list(&self) -> Result<Vec<VehiclePass>> {
        let tx = self.store.begin()?;
        Ok(tx.list_vehicle_passes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotkeeper_api::OwnerCategory;
    use lotkeeper_store::SqliteStore;

    fn registry() -> (PassRegistry, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        (PassRegistry::new(store.clone(), FacilityClock::default()), store)
    }

    fn pass(plate: &str, valid_until: NaiveDate) -> VehiclePass {
        VehiclePass {
            plate_number: plate.into(),
            owner_name: "Ana Cruz".into(),
            owner_category: OwnerCategory::Student,
            vehicle_type: "Sedan".into(),
            valid_until,
        }
    }

    fn days_from_today(days: i64) -> NaiveDate {
        FacilityClock::default().today() + chrono::Duration::days(days)
    }

    #[test]
    fn register_normalizes_and_renews() {
        let (registry, store) = registry();

        let stored = registry.register(pass("abc 1234", days_from_today(30))).unwrap();
        assert_eq!(stored.plate_number, "ABC 1234");

        registry.register(pass("ABC 1234", days_from_today(365))).unwrap();
        let passes = registry.list().unwrap();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].valid_until, days_from_today(365));

        let registered = store
            .get_recent_audits(10)
            .unwrap()
            .iter()
            .filter(|e| matches!(e.event, AuditEventType::VehiclePassRegistered { .. }))
            .count();
        assert_eq!(registered, 2);
    }

    #[test]
    fn register_refuses_already_expired_pass() {
        let (registry, _) = registry();
        assert!(matches!(
            registry.register(pass("ABC 1234", days_from_today(-1))),
            Err(LotkeeperError::Validation(_))
        ));
        assert!(registry.list().unwrap().is_empty());

        registry.register(pass("ABC 1234", days_from_today(0))).unwrap();
    }

    #[test]
    fn revoke_and_get() {
        let (registry, _) = registry();
        registry.register(pass("ABC 1234", days_from_today(10))).unwrap();

        assert_eq!(registry.get("abc 1234").unwrap().owner_name, "Ana Cruz");
        registry.revoke("abc 1234").unwrap();
        assert!(matches!(registry.get("ABC 1234"), Err(LotkeeperError::NotFound(_))));
        assert!(matches!(registry.revoke("ABC 1234"), Err(LotkeeperError::NotFound(_))));
    }

    #[test]
    fn check_pass_covers_last_day_only() {
        let (registry, store) = registry();
        let valid_until = NaiveDate::from_ymd_opt(2999, 6, 30).unwrap();
        registry.register(pass("ABC 1234", valid_until)).unwrap();

        let tx = store.begin().unwrap();
        assert!(check_pass(&*tx, "ABC 1234", valid_until).is_ok());
        assert!(matches!(
            check_pass(&*tx, "ABC 1234", valid_until + chrono::Duration::days(1)),
            Err(LotkeeperError::Conflict(_))
        ));
        assert!(matches!(
            check_pass(&*tx, "ZZZ 0000", valid_until),
            Err(LotkeeperError::Conflict(_))
        ));
    }
}
