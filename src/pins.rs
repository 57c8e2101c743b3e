//! Package pin maps.
//!
//! A [`PinMap`] is the external interface of a chip: a dense, 1-indexed run
//! of pins (`Pin1`..`PinN`), each holding one logic level. The size is fixed
//! at creation; reads or writes past the last pin are errors.

use crate::gates::{level_name, Signal};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 1-based package pin number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinId(u16);

impl PinId {
    /// Pin number `n`. Range against a concrete package is checked by [`PinMap`].
    pub const fn new(n: u16) -> Self {
        PinId(n)
    }

    pub fn number(&self) -> u16 {
        self.0
    }

    pub fn name(&self) -> String {
        format!("Pin{}", self.0)
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pin{}", self.0)
    }
}

impl FromStr for PinId {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("Pin")
            .ok_or_else(|| PinError::InvalidName(s.to_string()))?;
        match u16::from_str(digits) {
            Ok(n) if n >= 1 => Ok(PinId(n)),
            _ => Err(PinError::InvalidName(s.to_string())),
        }
    }
}

impl Serialize for PinId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PinError {
    #[error("invalid pin name: {0:?}")]
    InvalidName(String),
    #[error("{pin} is out of range for a {terminals}-pin package")]
    OutOfRange { pin: PinId, terminals: u16 },
}

/// Ordered pin-name to level mapping with a fixed number of entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PinMap {
    levels: Vec<Signal>,
}

impl PinMap {
    /// Identify `terminals` pins, all LOW.
    pub fn new(terminals: u16) -> Self {
        PinMap {
            levels: vec![false; terminals as usize],
        }
    }

    pub fn terminals(&self) -> u16 {
        self.levels.len() as u16
    }

    fn slot(&self, pin: PinId) -> Result<usize, PinError> {
        let idx = pin.0 as usize;
        if idx == 0 || idx > self.levels.len() {
            return Err(PinError::OutOfRange {
                pin,
                terminals: self.terminals(),
            });
        }
        Ok(idx - 1)
    }

    pub fn contains(&self, pin: PinId) -> bool {
        self.slot(pin).is_ok()
    }

    pub fn get(&self, pin: PinId) -> Result<Signal, PinError> {
        Ok(self.levels[self.slot(pin)?])
    }

    pub fn set(&mut self, pin: PinId, level: Signal) -> Result<(), PinError> {
        let idx = self.slot(pin)?;
        self.levels[idx] = level;
        Ok(())
    }

    /// Look a pin up by its name (`"Pin13"`).
    pub fn get_named(&self, name: &str) -> Result<Signal, PinError> {
        self.get(PinId::from_str(name)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PinId, Signal)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .map(|(idx, level)| (PinId(idx as u16 + 1), *level))
    }

    pub fn all_low(&self) -> bool {
        self.levels.iter().all(|level| !level)
    }
}

impl Serialize for PinMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.levels.len()))?;
        for (pin, level) in self.iter() {
            map.serialize_entry(&pin, &level)?;
        }
        map.end()
    }
}

impl fmt::Display for PinMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pin, level) in self.iter() {
            writeln!(f, "{:>6}: {}", pin.to_string(), level_name(level))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifies_all_pins_low() {
        let pins = PinMap::new(16);
        assert_eq!(pins.terminals(), 16);
        assert!(pins.all_low());
        let names: Vec<String> = pins.iter().map(|(p, _)| p.name()).collect();
        assert_eq!(names.first().map(String::as_str), Some("Pin1"));
        assert_eq!(names.last().map(String::as_str), Some("Pin16"));
    }

    #[test]
    fn rejects_out_of_range_pins() {
        let mut pins = PinMap::new(14);
        assert_eq!(
            pins.set(PinId::new(15), true),
            Err(PinError::OutOfRange {
                pin: PinId::new(15),
                terminals: 14
            })
        );
        assert!(pins.get(PinId::new(0)).is_err());
        assert_eq!(pins.terminals(), 14);
        pins.set(PinId::new(14), true).unwrap();
        assert!(pins.get(PinId::new(14)).unwrap());
    }

    #[test]
    fn parses_pin_names() {
        assert_eq!("Pin7".parse::<PinId>(), Ok(PinId::new(7)));
        assert!("Pin0".parse::<PinId>().is_err());
        assert!("pin7".parse::<PinId>().is_err());
        assert!("Pin".parse::<PinId>().is_err());
        let pins = PinMap::new(16);
        assert!(pins.get_named("Pin17").is_err());
        assert_eq!(pins.get_named("Pin16"), Ok(false));
    }

    #[test]
    fn serializes_as_ordered_object() {
        let mut pins = PinMap::new(3);
        pins.set(PinId::new(2), true).unwrap();
        let text = serde_json::to_string(&pins).unwrap();
        assert_eq!(text, r#"{"Pin1":false,"Pin2":true,"Pin3":false}"#);
    }

    #[test]
    fn display_lists_levels() {
        let mut pins = PinMap::new(2);
        pins.set(PinId::new(1), true).unwrap();
        assert_eq!(pins.to_string(), "  Pin1: HIGH\n  Pin2: LOW\n");
    }
}
