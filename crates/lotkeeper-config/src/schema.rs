//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Process-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Physical layout and local time of the facility
    #[serde(default)]
    pub facility: RawFacilityConfig,

    /// Late detection and expungement timing
    #[serde(default)]
    pub timer: RawTimerConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/lotkeeper/lotkeeperd.sock)
    pub socket_path: Option<PathBuf>,

    /// Data directory for the database (default: $XDG_DATA_HOME/lotkeeper)
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFacilityConfig {
    /// Fixed UTC offset such as "+08:00"
    pub utc_offset: Option<String>,

    /// Number of slot rows (1..=99)
    pub rows: Option<u32>,

    /// Number of slot letters per row (1..=26)
    pub letters: Option<u32>,

    /// Refuse walk-in parking for plates without a valid vehicle pass
    pub require_vehicle_pass: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTimerConfig {
    pub tick_interval_ms: Option<u64>,

    /// Time a late reservation keeps its slot
    pub grace_period_minutes: Option<u64>,

    /// How far ahead an approved reservation counts as upcoming
    pub upcoming_window_minutes: Option<u64>,

    pub sweep_stale_on_startup: Option<bool>,

    /// Run the stale sweep once at the start of each facility-local day
    pub sweep_stale_daily: Option<bool>,
}
