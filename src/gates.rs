//! # Gates: Primitive Boolean Functions
//!
//! Every gate holds one or two input terminals and computes its output on
//! demand from their current levels. Nothing is cached: re-wiring a terminal
//! is picked up by the next call to [`Gate::output`].
//!
//! ## Example
//!
//! ```rust
//! use ic_netlist::gates::{Gate, GateKind, Terminal};
//!
//! let mut nand = Gate::new(GateKind::Nand, 1);
//! assert!(nand.output());
//! nand.set_terminal(Terminal::One, true).unwrap();
//! nand.set_terminal(Terminal::Two, true).unwrap();
//! assert!(!nand.output());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Logic level on a terminal, net or pin. `true` is HIGH.
pub type Signal = bool;

/// A Boolean slot received something that is not a Boolean.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("type mismatch: {slot} expects a boolean, got {found}")]
pub struct TypeMismatch {
    /// Name of the slot that rejected the value (`"pwr"`, `"terminal one"`, ...)
    pub slot: String,
    /// JSON type of the rejected value
    pub found: &'static str,
}

/// Coerce a dynamically typed value into a [`Signal`].
///
/// Only JSON booleans are accepted; `0`, `1`, `"HIGH"` and `null` are all
/// rejected.
pub fn signal_from_value(slot: &str, value: &Value) -> Result<Signal, TypeMismatch> {
    match value {
        Value::Bool(level) => Ok(*level),
        other => Err(TypeMismatch {
            slot: slot.to_string(),
            found: json_type_name(other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a level the way gate traces and pin listings print it.
pub fn level_name(level: Signal) -> &'static str {
    if level {
        "HIGH"
    } else {
        "LOW"
    }
}

/// The closed set of primitive gate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    And,
    Or,
    /// Inverter (single input)
    Not,
    Nand,
    Nor,
    Xnor,
    /// Kept under its own name but computes exactly NAND.
    Xnand,
    /// Non-inverting driver (single input)
    Buffer,
}

impl GateKind {
    pub const ALL: [GateKind; 8] = [
        GateKind::And,
        GateKind::Or,
        GateKind::Not,
        GateKind::Nand,
        GateKind::Nor,
        GateKind::Xnor,
        GateKind::Xnand,
        GateKind::Buffer,
    ];

    /// Parse a gate mnemonic (`"AND"`, `"BUF"`, ...).
    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "AND" => Some(GateKind::And),
            "OR" => Some(GateKind::Or),
            "NOT" => Some(GateKind::Not),
            "NAND" => Some(GateKind::Nand),
            "NOR" => Some(GateKind::Nor),
            "XNOR" => Some(GateKind::Xnor),
            "XNAND" => Some(GateKind::Xnand),
            "BUF" => Some(GateKind::Buffer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::And => "AND",
            GateKind::Or => "OR",
            GateKind::Not => "NOT",
            GateKind::Nand => "NAND",
            GateKind::Nor => "NOR",
            GateKind::Xnor => "XNOR",
            GateKind::Xnand => "XNAND",
            GateKind::Buffer => "BUF",
        }
    }

    /// Number of input terminals (1 or 2).
    pub fn arity(&self) -> usize {
        match self {
            GateKind::Not | GateKind::Buffer => 1,
            _ => 2,
        }
    }

    pub fn is_single_input(&self) -> bool {
        self.arity() == 1
    }

    /// Apply the gate function to explicit terminal levels.
    ///
    /// `b` is ignored by single-input kinds.
    pub fn apply(&self, a: Signal, b: Signal) -> Signal {
        match self {
            GateKind::And => a && b,
            GateKind::Or => a || b,
            GateKind::Not => !a,
            GateKind::Nand | GateKind::Xnand => !(a && b),
            GateKind::Nor => !(a || b),
            GateKind::Xnor => a == b,
            GateKind::Buffer => a,
        }
    }

    fn idle_terminals(&self) -> Terminals {
        if self.is_single_input() {
            Terminals::Single(false)
        } else {
            Terminals::Dual(false, false)
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input terminal selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Terminal {
    One,
    Two,
}

impl Terminal {
    pub fn index(&self) -> usize {
        match self {
            Terminal::One => 0,
            Terminal::Two => 1,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Terminal::One => "terminal one",
            Terminal::Two => "terminal two",
        }
    }
}

/// Terminal levels; the variant fixes how many terminals exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminals {
    Single(Signal),
    Dual(Signal, Signal),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),
    #[error("{kind} gate {id} has no terminal two")]
    NoSuchTerminal { kind: GateKind, id: u32 },
    #[error("{kind} takes {expected} input(s), got {got}")]
    Arity {
        kind: GateKind,
        expected: usize,
        got: usize,
    },
}

/// A primitive gate instance.
///
/// `id` is a tracing label only; several gates may share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    id: u32,
    kind: GateKind,
    terminals: Terminals,
}

impl Gate {
    /// A gate with every terminal LOW.
    pub fn new(kind: GateKind, id: u32) -> Self {
        Gate {
            id,
            kind,
            terminals: kind.idle_terminals(),
        }
    }

    /// Build a gate from dynamically typed terminal values.
    ///
    /// Fewer values than terminals leaves the rest LOW; more is an arity error.
    pub fn from_values(kind: GateKind, id: u32, values: &[Value]) -> Result<Self, GateError> {
        if values.len() > kind.arity() {
            return Err(GateError::Arity {
                kind,
                expected: kind.arity(),
                got: values.len(),
            });
        }
        let mut gate = Gate::new(kind, id);
        for (value, terminal) in values.iter().zip([Terminal::One, Terminal::Two]) {
            gate.set_terminal_value(terminal, value)?;
        }
        Ok(gate)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> GateKind {
        self.kind
    }

    pub fn terminals(&self) -> Terminals {
        self.terminals
    }

    /// Current level of a terminal, `None` for terminal two of a single-input gate.
    pub fn terminal(&self, terminal: Terminal) -> Option<Signal> {
        match (self.terminals, terminal) {
            (Terminals::Single(a), Terminal::One) | (Terminals::Dual(a, _), Terminal::One) => {
                Some(a)
            }
            (Terminals::Dual(_, b), Terminal::Two) => Some(b),
            (Terminals::Single(_), Terminal::Two) => None,
        }
    }

    pub fn set_terminal(&mut self, terminal: Terminal, level: Signal) -> Result<(), GateError> {
        match (&mut self.terminals, terminal) {
            (Terminals::Single(a), Terminal::One) | (Terminals::Dual(a, _), Terminal::One) => {
                *a = level
            }
            (Terminals::Dual(_, b), Terminal::Two) => *b = level,
            (Terminals::Single(_), Terminal::Two) => {
                return Err(GateError::NoSuchTerminal {
                    kind: self.kind,
                    id: self.id,
                })
            }
        }
        Ok(())
    }

    /// Checked assignment from a dynamic value; the terminal is left untouched on error.
    pub fn set_terminal_value(&mut self, terminal: Terminal, value: &Value) -> Result<(), GateError> {
        let level = signal_from_value(terminal.label(), value)?;
        self.set_terminal(terminal, level)
    }

    /// Evaluate the gate from its current terminal levels.
    pub fn output(&self) -> Signal {
        match self.terminals {
            Terminals::Single(a) => self.kind.apply(a, false),
            Terminals::Dual(a, b) => self.kind.apply(a, b),
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} gate #{}", self.kind, self.id)?;
        match self.terminals {
            Terminals::Single(a) => writeln!(f, "  input      : {}", level_name(a))?,
            Terminals::Dual(a, b) => {
                writeln!(f, "  input one  : {}", level_name(a))?;
                writeln!(f, "  input two  : {}", level_name(b))?;
            }
        }
        write!(f, "  output     : {}", level_name(self.output()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAIRS: [(bool, bool); 4] = [(false, false), (false, true), (true, false), (true, true)];

    fn dual(kind: GateKind, a: bool, b: bool) -> bool {
        let mut gate = Gate::new(kind, 0);
        gate.set_terminal(Terminal::One, a).unwrap();
        gate.set_terminal(Terminal::Two, b).unwrap();
        gate.output()
    }

    fn single(kind: GateKind, a: bool) -> bool {
        let mut gate = Gate::new(kind, 0);
        gate.set_terminal(Terminal::One, a).unwrap();
        gate.output()
    }

    #[test]
    fn two_input_truth_tables() {
        let table: [(GateKind, [bool; 4]); 6] = [
            (GateKind::Or, [false, true, true, true]),
            (GateKind::And, [false, false, false, true]),
            (GateKind::Nor, [true, false, false, false]),
            (GateKind::Nand, [true, true, true, false]),
            (GateKind::Xnor, [true, false, false, true]),
            (GateKind::Xnand, [true, true, true, false]),
        ];
        for (kind, expected) in table {
            for ((a, b), want) in PAIRS.iter().zip(expected) {
                assert_eq!(dual(kind, *a, *b), want, "{kind} on ({a}, {b})");
            }
        }
    }

    #[test]
    fn xnand_stays_identical_to_nand() {
        for (a, b) in PAIRS {
            assert_eq!(dual(GateKind::Xnand, a, b), dual(GateKind::Nand, a, b));
            assert_eq!(dual(GateKind::And, a, b), a && b);
        }
    }

    #[test]
    fn single_input_gates() {
        for x in [false, true] {
            assert_eq!(single(GateKind::Not, x), !x);
            assert_eq!(single(GateKind::Buffer, x), x);
        }
    }

    #[test]
    fn single_input_gate_has_no_second_terminal() {
        let mut not = Gate::new(GateKind::Not, 3);
        assert_eq!(not.terminal(Terminal::Two), None);
        let err = not.set_terminal(Terminal::Two, true).unwrap_err();
        assert_eq!(
            err,
            GateError::NoSuchTerminal {
                kind: GateKind::Not,
                id: 3
            }
        );
        assert!(not.output());
    }

    #[test]
    fn output_is_idempotent_and_tracks_rewiring() {
        let mut or = Gate::new(GateKind::Or, 1);
        assert_eq!(or.output(), or.output());
        or.set_terminal(Terminal::Two, true).unwrap();
        assert!(or.output());
        assert_eq!(or.output(), or.output());
        or.set_terminal(Terminal::Two, false).unwrap();
        assert!(!or.output());
    }

    #[test]
    fn construction_rejects_non_boolean_terminals() {
        let err = Gate::from_values(GateKind::And, 1, &[json!(true), json!(1)]).unwrap_err();
        match err {
            GateError::TypeMismatch(m) => {
                assert_eq!(m.slot, "terminal two");
                assert_eq!(m.found, "number");
            }
            other => panic!("expected type mismatch, got {other:?}"),
        }
        assert!(Gate::from_values(GateKind::Not, 1, &[json!("HIGH")]).is_err());
        assert!(matches!(
            Gate::from_values(GateKind::Buffer, 1, &[json!(true), json!(false)]),
            Err(GateError::Arity { expected: 1, got: 2, .. })
        ));
        let gate = Gate::from_values(GateKind::Nor, 2, &[json!(false), json!(false)]).unwrap();
        assert!(gate.output());
    }

    #[test]
    fn later_illegal_assignment_is_caught_and_ignored() {
        let mut gate = Gate::from_values(GateKind::Nand, 4, &[json!(true), json!(true)]).unwrap();
        assert!(gate.set_terminal_value(Terminal::One, &json!(null)).is_err());
        assert_eq!(gate.terminal(Terminal::One), Some(true));
        assert!(!gate.output());
    }

    #[test]
    fn mnemonics_round_trip() {
        for kind in GateKind::ALL {
            assert_eq!(GateKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(GateKind::from_str("XOR"), None);
    }

    #[test]
    fn trace_format_shows_terminals_and_output() {
        let mut buf = Gate::new(GateKind::Buffer, 2);
        buf.set_terminal(Terminal::One, true).unwrap();
        let text = buf.to_string();
        assert!(text.starts_with("BUF gate #2"));
        assert!(text.contains("input      : HIGH"));
        assert!(text.ends_with("output     : HIGH"));

        let nor = Gate::new(GateKind::Nor, 7);
        let text = nor.to_string();
        assert!(text.contains("input two  : LOW"));
        assert!(text.ends_with("output     : HIGH"));
    }
}
