//! Config validation CLI tool
//!
//! Validates a lotkeeperd configuration file and reports any errors.

use lotkeeper_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a lotkeeperd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match lotkeeper_config::load_config(&config_path) {
        Ok(config) => {
            let slots = config.facility.slot_universe();
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", lotkeeper_config::CURRENT_CONFIG_VERSION);
            println!("  UTC offset: {}", config.facility.utc_offset);
            println!(
                "  Slots: {} ({} rows x {} letters)",
                slots.len(),
                config.facility.rows,
                config.facility.letters
            );
            if let (Some(first), Some(last)) = (slots.first(), slots.last()) {
                println!("  Slot range: {}..{}", first, last);
            }
            println!(
                "  Walk-ins need a vehicle pass: {}",
                config.facility.require_vehicle_pass
            );
            println!("  Tick interval: {:?}", config.timer.tick_interval);
            println!("  Grace period: {}", format_duration(config.timer.grace_period));
            println!(
                "  Upcoming window: {}",
                format_duration(config.timer.upcoming_window)
            );
            println!(
                "  Stale sweep: startup={} daily={}",
                config.timer.sweep_stale_on_startup, config.timer.sweep_stale_daily
            );
            println!("  Socket: {}", config.service.socket_path.display());
            println!("  Data dir: {}", config.service.data_dir.display());

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                lotkeeper_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                lotkeeper_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                lotkeeper_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                lotkeeper_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        lotkeeper_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
