//! Resolved configuration, with defaults applied

use chrono::FixedOffset;
use lotkeeper_util::{default_data_dir, default_socket_path, FacilityClock, SlotNumber};
use std::path::PathBuf;
use std::time::Duration;

use crate::schema::{RawConfig, RawFacilityConfig, RawServiceConfig, RawTimerConfig};

/// Time a late reservation keeps its slot before it is expunged
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(15 * 60);

/// How far ahead an approved reservation is shown as upcoming
pub const DEFAULT_UPCOMING_WINDOW: Duration = Duration::from_secs(60 * 60);

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

pub const DEFAULT_ROWS: u8 = 5;
pub const DEFAULT_LETTERS: u8 = 5;

/// Validated configuration used by the service
#[derive(Debug, Clone, Default)]
pub struct FacilityConfig {
    pub service: ServiceConfig,
    pub facility: FacilitySettings,
    pub timer: TimerSettings,
}

impl FacilityConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            facility: FacilitySettings::from_raw(raw.facility),
            timer: TimerSettings::from_raw(raw.timer),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(default_socket_path),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Slot layout and local clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacilitySettings {
    pub utc_offset: FixedOffset,
    pub rows: u8,
    pub letters: u8,
    pub require_vehicle_pass: bool,
}

impl FacilitySettings {
    fn from_raw(raw: RawFacilityConfig) -> Self {
        let defaults = Self::default();
        Self {
            utc_offset: raw
                .utc_offset
                .and_then(|s| lotkeeper_util::parse_utc_offset(&s).ok())
                .unwrap_or(defaults.utc_offset),
            rows: raw
                .rows
                .and_then(|r| u8::try_from(r).ok())
                .unwrap_or(defaults.rows),
            letters: raw
                .letters
                .and_then(|l| u8::try_from(l).ok())
                .unwrap_or(defaults.letters),
            require_vehicle_pass: raw
                .require_vehicle_pass
                .unwrap_or(defaults.require_vehicle_pass),
        }
    }

    pub fn clock(&self) -> FacilityClock {
        FacilityClock::new(self.utc_offset)
    }

    /// Every slot the facility has
    pub fn slot_universe(&self) -> Vec<SlotNumber> {
        SlotNumber::universe(self.rows, self.letters)
    }
}

impl Default for FacilitySettings {
    fn default() -> Self {
        Self {
            utc_offset: FacilityClock::default().offset(),
            rows: DEFAULT_ROWS,
            letters: DEFAULT_LETTERS,
            require_vehicle_pass: false,
        }
    }
}

/// Timer engine cadence and durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub tick_interval: Duration,
    pub grace_period: Duration,
    pub upcoming_window: Duration,
    pub sweep_stale_on_startup: bool,
    pub sweep_stale_daily: bool,
}

impl TimerSettings {
    fn from_raw(raw: RawTimerConfig) -> Self {
        let defaults = Self::default();
        Self {
            tick_interval: raw
                .tick_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            grace_period: raw
                .grace_period_minutes
                .map(|m| Duration::from_secs(m * 60))
                .unwrap_or(defaults.grace_period),
            upcoming_window: raw
                .upcoming_window_minutes
                .map(|m| Duration::from_secs(m * 60))
                .unwrap_or(defaults.upcoming_window),
            sweep_stale_on_startup: raw
                .sweep_stale_on_startup
                .unwrap_or(defaults.sweep_stale_on_startup),
            sweep_stale_daily: raw.sweep_stale_daily.unwrap_or(defaults.sweep_stale_daily),
        }
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            grace_period: DEFAULT_GRACE_PERIOD,
            upcoming_window: DEFAULT_UPCOMING_WINDOW,
            sweep_stale_on_startup: true,
            sweep_stale_daily: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotkeeper_util::DEFAULT_UTC_OFFSET_SECS;

    #[test]
    fn defaults_match_facility() {
        let settings = FacilitySettings::default();
        assert_eq!(settings.utc_offset.local_minus_utc(), DEFAULT_UTC_OFFSET_SECS);
        assert_eq!(settings.slot_universe().len(), 25);
        assert!(!settings.require_vehicle_pass);

        let timer = TimerSettings::default();
        assert_eq!(timer.grace_period, Duration::from_secs(900));
        assert_eq!(timer.upcoming_window, Duration::from_secs(3600));
        assert_eq!(timer.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let raw: RawConfig = toml::from_str(
            r#"
            config_version = 1
            [facility]
            utc_offset = "-05:00"
            rows = 3
            letters = 4
            require_vehicle_pass = true
            [timer]
            grace_period_minutes = 5
            sweep_stale_daily = false
        "#,
        )
        .unwrap();

        let config = FacilityConfig::from_raw(raw);
        assert_eq!(config.facility.utc_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(config.facility.slot_universe().len(), 12);
        assert!(config.facility.require_vehicle_pass);
        assert_eq!(config.timer.grace_period, Duration::from_secs(300));
        assert!(!config.timer.sweep_stale_daily);
        assert!(config.timer.sweep_stale_on_startup);
    }
}
