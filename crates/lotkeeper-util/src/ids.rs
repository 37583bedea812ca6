//! Strongly-typed identifiers for lotkeeper

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::LotkeeperError;

/// Identifier of a reservation row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(i64);

impl ReservationId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ReservationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Physical slot label such as `1A`: a row number followed by a letter.
///
/// Ordering is by row, then letter, so `2A` sorts before `10A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotNumber {
    row: u8,
    letter: char,
}

impl SlotNumber {
    pub fn new(row: u8, letter: char) -> Option<Self> {
        if row == 0 || !letter.is_ascii_alphabetic() {
            return None;
        }
        Some(Self {
            row,
            letter: letter.to_ascii_uppercase(),
        })
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    /// Generate the slot universe: rows `1..=rows`, letters `A..` (`letters` of them)
    pub fn universe(rows: u8, letters: u8) -> Vec<SlotNumber> {
        let letters = letters.min(26);
        (1..=rows)
            .flat_map(|row| {
                (0..letters).map(move |i| SlotNumber {
                    row,
                    letter: (b'A' + i) as char,
                })
            })
            .collect()
    }
}

impl fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.letter)
    }
}

impl FromStr for SlotNumber {
    type Err = LotkeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || LotkeeperError::validation(format!("invalid slot number '{}'", s));

        let letter = s.chars().last().ok_or_else(invalid)?;
        let digits = &s[..s.len() - letter.len_utf8()];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let row: u8 = digits.parse().map_err(|_| invalid())?;

        SlotNumber::new(row, letter).ok_or_else(invalid)
    }
}

impl TryFrom<String> for SlotNumber {
    type Error = LotkeeperError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SlotNumber> for String {
    fn from(slot: SlotNumber) -> Self {
        slot.to_string()
    }
}

/// Unique identifier for a connected IPC client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_number_parse() {
        let slot: SlotNumber = "1A".parse().unwrap();
        assert_eq!(slot.row(), 1);
        assert_eq!(slot.letter(), 'A');

        let slot: SlotNumber = " 12c ".parse().unwrap();
        assert_eq!(slot.to_string(), "12C");

        assert!("A1".parse::<SlotNumber>().is_err());
        assert!("0A".parse::<SlotNumber>().is_err());
        assert!("1".parse::<SlotNumber>().is_err());
        assert!("".parse::<SlotNumber>().is_err());
        assert!("1?".parse::<SlotNumber>().is_err());
    }

    #[test]
    fn slot_number_ordering() {
        let a: SlotNumber = "2A".parse().unwrap();
        let b: SlotNumber = "2B".parse().unwrap();
        let c: SlotNumber = "10A".parse().unwrap();

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn slot_universe_is_rows_by_letters() {
        let slots = SlotNumber::universe(5, 5);
        assert_eq!(slots.len(), 25);
        assert_eq!(slots.first().unwrap().to_string(), "1A");
        assert_eq!(slots.last().unwrap().to_string(), "5E");

        let mut sorted = slots.clone();
        sorted.sort();
        assert_eq!(slots, sorted);
    }

    #[test]
    fn ids_serialize_deserialize() {
        let slot: SlotNumber = "3D".parse().unwrap();
        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(json, "\"3D\"");
        let parsed: SlotNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(slot, parsed);

        let id = ReservationId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        assert!(serde_json::from_str::<SlotNumber>("\"zz\"").is_err());
    }
}
