//! # ic_netlist
//!
//! **Gate-level models of TTL integrated circuits**
//!
//! Chips are built from primitive logic gates wired into a validated,
//! topologically ordered netlist and evaluated against a pin map. The
//! flagship model is the 7447 BCD-to-seven-segment decoder/driver.
//!
//! ## Quick Start
//!
//! ```rust
//! use ic_netlist::{Bcd, Controls, Ic7447, IntegratedCircuit, Rails, Segments};
//!
//! // Digit 7 on a live chip: segments a, b and c lit (pins LOW).
//! let chip = Ic7447::with_bcd(Rails::live(), Bcd::from_nibble(7));
//! let pins = chip.process().unwrap();
//! assert_eq!(Segments::from_pins(&pins).unwrap().pattern(), "0001111");
//!
//! // Lamp test overrides the digit.
//! let lamp = chip.with_controls(Controls::lamp_test());
//! assert_eq!(lamp.segments().unwrap().pattern(), "0000000");
//!
//! let identity = ic_netlist::ic7447::netlist().unwrap().hash();
//! println!("7447 netlist: blake3:{identity}");
//! ```
//!
//! ## Key Concepts
//!
//! - **Gate**: one primitive (AND, OR, NOT, NAND, NOR, XNOR, XNAND, BUF) with
//!   one or two input terminals
//! - **Pin map**: the chip's external interface, `Pin1`..`PinN`
//! - **Netlist**: named gates and nets with a fixed evaluation order
//! - **Power guard**: a chip without power, or with a ground fault, leaves
//!   every pin LOW

pub mod config;
pub mod gates;
pub mod ic;
pub mod ic7447;
pub mod netlist;
pub mod pins;

pub use gates::{Gate, GateKind, Signal, Terminal, TypeMismatch};
pub use ic::{IcError, IntegratedCircuit, Rails};
pub use ic7447::{truth_table, Bcd, Controls, Ic7447, Segments};
pub use netlist::{Netlist, NetlistBuilder, NetlistError};
pub use pins::{PinId, PinMap};
