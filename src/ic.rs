//! # IC: the integrated-circuit contract
//!
//! A chip owns its supply rails and a pin map and evaluates in stages:
//!
//! 1. [`IntegratedCircuit::inputs`] writes external and control levels into
//!    a freshly identified pin map.
//! 2. [`IntegratedCircuit::drive`] runs the internal logic against those
//!    pins and writes the output pins.
//! 3. [`IntegratedCircuit::process`] sequences both behind the power guard.
//!
//! An unpowered or grounded chip performs no logic at all: `process` returns
//! the all-LOW pin map and `output` returns LOW.

use crate::gates::{signal_from_value, Signal, TypeMismatch};
use crate::netlist::NetlistError;
use crate::pins::{PinError, PinId, PinMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IcError {
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),
    #[error(transparent)]
    Pin(#[from] PinError),
    #[error("netlist: {0}")]
    Netlist(#[from] NetlistError),
    #[error("package needs at least {required} terminals, got {got}")]
    TooFewTerminals { required: u16, got: u16 },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Supply state of a chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rails {
    /// VCC applied
    pub pwr: Signal,
    /// Ground fault; must be LOW for normal operation
    pub gnd: Signal,
}

impl Rails {
    pub fn new(pwr: Signal, gnd: Signal) -> Self {
        Rails { pwr, gnd }
    }

    /// Powered and not grounded.
    pub fn live() -> Self {
        Rails::new(true, false)
    }

    pub fn from_values(pwr: &Value, gnd: &Value) -> Result<Self, TypeMismatch> {
        Ok(Rails {
            pwr: signal_from_value("pwr", pwr)?,
            gnd: signal_from_value("gnd", gnd)?,
        })
    }

    pub fn is_live(&self) -> bool {
        self.pwr && !self.gnd
    }
}

impl Default for Rails {
    fn default() -> Self {
        Rails::live()
    }
}

/// Staged lifecycle shared by every chip model.
pub trait IntegratedCircuit {
    fn name(&self) -> &str;

    fn rails(&self) -> Rails;

    /// Package terminal count, including supply pins.
    fn terminal_count(&self) -> u16;

    /// Pin carrying the chip's representative output.
    fn representative_pin(&self) -> PinId;

    /// A fresh pin map with every pin LOW.
    fn terminal_identify(&self) -> PinMap {
        PinMap::new(self.terminal_count())
    }

    /// Write external and control levels into a fresh pin map.
    fn inputs(&self) -> Result<PinMap, IcError>;

    /// Evaluate the internal logic from `pins` and write the output pins.
    fn drive(&self, pins: &mut PinMap) -> Result<(), IcError>;

    fn process(&self) -> Result<PinMap, IcError> {
        let rails = self.rails();
        if !rails.is_live() {
            debug!(chip = self.name(), pwr = rails.pwr, gnd = rails.gnd, "chip not live, pins stay low");
            return Ok(self.terminal_identify());
        }
        let mut pins = self.inputs()?;
        self.drive(&mut pins)?;
        Ok(pins)
    }

    fn output(&self) -> Result<Signal, IcError> {
        if !self.rails().is_live() {
            return Ok(false);
        }
        let pins = self.process()?;
        Ok(pins.get(self.representative_pin())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::{Gate, GateKind, Terminal};
    use serde_json::json;

    /// One NAND on a 4-pin package: inputs on 1 and 2, output on 3.
    struct SingleNand {
        rails: Rails,
        a: Signal,
        b: Signal,
    }

    impl IntegratedCircuit for SingleNand {
        fn name(&self) -> &str {
            "single-nand"
        }

        fn rails(&self) -> Rails {
            self.rails
        }

        fn terminal_count(&self) -> u16 {
            4
        }

        fn representative_pin(&self) -> PinId {
            PinId::new(3)
        }

        fn inputs(&self) -> Result<PinMap, IcError> {
            let mut pins = self.terminal_identify();
            pins.set(PinId::new(1), self.a)?;
            pins.set(PinId::new(2), self.b)?;
            Ok(pins)
        }

        fn drive(&self, pins: &mut PinMap) -> Result<(), IcError> {
            let mut gate = Gate::new(GateKind::Nand, 1);
            gate.set_terminal(Terminal::One, pins.get(PinId::new(1))?)
                .expect("dual-input gate");
            gate.set_terminal(Terminal::Two, pins.get(PinId::new(2))?)
                .expect("dual-input gate");
            pins.set(PinId::new(3), gate.output())?;
            Ok(())
        }
    }

    #[test]
    fn live_chip_runs_all_stages() {
        let chip = SingleNand {
            rails: Rails::live(),
            a: true,
            b: false,
        };
        let pins = chip.process().unwrap();
        assert!(pins.get(PinId::new(1)).unwrap());
        assert!(pins.get(PinId::new(3)).unwrap());
        assert!(chip.output().unwrap());
    }

    #[test]
    fn dead_rails_skip_all_logic() {
        for rails in [Rails::new(false, false), Rails::new(true, true), Rails::new(false, true)] {
            let chip = SingleNand {
                rails,
                a: true,
                b: false,
            };
            let pins = chip.process().unwrap();
            assert!(pins.all_low(), "{rails:?}");
            assert_eq!(pins.terminals(), 4);
            assert!(!chip.output().unwrap());
        }
    }

    #[test]
    fn rails_reject_non_boolean_values() {
        let err = Rails::from_values(&json!(true), &json!(0)).unwrap_err();
        assert_eq!(err.slot, "gnd");
        assert!(Rails::from_values(&json!("on"), &json!(false)).is_err());
        let rails = Rails::from_values(&json!(true), &json!(false)).unwrap();
        assert!(rails.is_live());
    }
}
