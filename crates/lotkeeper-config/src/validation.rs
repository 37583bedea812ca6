//! Configuration validation

use crate::schema::{RawConfig, RawFacilityConfig, RawTimerConfig};
use thiserror::Error;

/// Largest row count a slot label can carry
pub const MAX_ROWS: u32 = 99;

/// Slot letters run A through Z
pub const MAX_LETTERS: u32 = 26;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid UTC offset '{value}': {message}")]
    InvalidUtcOffset { value: String, message: String },

    #[error("facility.{field} = {value} is out of range (1..={max})")]
    LayoutOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("timer.{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_facility(&config.facility));
    errors.extend(validate_timer(&config.timer));

    if let (Some(socket), Some(data_dir)) = (&config.service.socket_path, &config.service.data_dir)
    {
        if socket == data_dir {
            errors.push(ValidationError::GlobalError(
                "service.socket_path and service.data_dir must differ".into(),
            ));
        }
    }

    errors
}

fn validate_facility(facility: &RawFacilityConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(offset) = &facility.utc_offset {
        if let Err(message) = lotkeeper_util::parse_utc_offset(offset) {
            errors.push(ValidationError::InvalidUtcOffset {
                value: offset.clone(),
                message,
            });
        }
    }

    for (field, value, max) in [
        ("rows", facility.rows, MAX_ROWS),
        ("letters", facility.letters, MAX_LETTERS),
    ] {
        if let Some(value) = value {
            if value == 0 || value > max {
                errors.push(ValidationError::LayoutOutOfRange { field, value, max });
            }
        }
    }

    errors
}

fn validate_timer(timer: &RawTimerConfig) -> Vec<ValidationError> {
    [
        ("tick_interval_ms", timer.tick_interval_ms),
        ("grace_period_minutes", timer.grace_period_minutes),
        ("upcoming_window_minutes", timer.upcoming_window_minutes),
    ]
    .into_iter()
    .filter(|(_, value)| *value == Some(0))
    .map(|(field, _)| ValidationError::ZeroDuration { field })
    .collect()
}
