//! Input validation for submissions, walk-in occupants, and vehicle passes

use lotkeeper_api::{Occupant, OwnerCategory, ReservationRequest, VehiclePass};
use lotkeeper_store::NewReservation;
use lotkeeper_util::{parse_date, parse_time_of_day, LotkeeperError, Result};

/// Trim a required text field, failing if nothing is left
pub fn require(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LotkeeperError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Normalize a plate number to `AAA 9999`.
///
/// Input is trimmed and upper-cased before the format is checked.
pub fn normalize_plate(raw: &str) -> Result<String> {
    let plate = raw.trim().to_ascii_uppercase();
    let bytes = plate.as_bytes();

    let well_formed = bytes.len() == 8
        && bytes[..3].iter().all(u8::is_ascii_uppercase)
        && bytes[3] == b' '
        && bytes[4..].iter().all(u8::is_ascii_digit);

    if !well_formed {
        return Err(LotkeeperError::validation(format!(
            "invalid plate number '{}': expected format 'AAA 9999'",
            raw.trim()
        )));
    }
    Ok(plate)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_address_char(c: char) -> bool {
    is_word_char(c) || c == '.' || c == '-'
}

/// Basic `local@domain.tld` shape check
pub fn validate_email(raw: &str) -> Result<String> {
    let email = require("email", raw)?;
    let invalid = || LotkeeperError::validation(format!("invalid email address '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;

    let ok = !local.is_empty()
        && local.chars().all(is_address_char)
        && !host.is_empty()
        && host.chars().all(is_address_char)
        && !tld.is_empty()
        && tld.chars().all(is_word_char);

    if !ok {
        return Err(invalid());
    }
    Ok(email)
}

/// Validate a public submission into a row ready for insertion
pub fn validate_request(
    request: &ReservationRequest,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Result<NewReservation> {
    Ok(NewReservation {
        name: require("name", &request.name)?,
        owner_category: request.owner_category.parse::<OwnerCategory>()?,
        email: validate_email(&request.email)?,
        contact_number: require("contact number", &request.contact_number)?,
        plate_number: normalize_plate(&request.plate_number)?,
        vehicle_type: require("vehicle type", &request.vehicle_type)?,
        scheduled_date: parse_date(&request.date)?,
        scheduled_time: parse_time_of_day(&request.time)?,
        created_at,
    })
}

/// Validate and normalize a walk-in occupant
pub fn validate_occupant(occupant: Occupant) -> Result<Occupant> {
    Ok(Occupant {
        vehicle_type: require("vehicle type", &occupant.vehicle_type)?,
        owner_name: require("owner name", &occupant.owner_name)?,
        plate_number: normalize_plate(&occupant.plate_number)?,
        owner_category: occupant.owner_category,
        contact_number: require("contact number", &occupant.contact_number)?,
    })
}

/// Validate and normalize a vehicle pass registration
pub fn validate_pass(pass: VehiclePass) -> Result<VehiclePass> {
    Ok(VehiclePass {
        plate_number: normalize_plate(&pass.plate_number)?,
        owner_name: require("owner name", &pass.owner_name)?,
        owner_category: pass.owner_category,
        vehicle_type: require("vehicle type", &pass.vehicle_type)?,
        valid_until: pass.valid_until,
    })
}
