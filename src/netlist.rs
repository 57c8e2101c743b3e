//! # Netlist: gate DAG with named nets
//!
//! A netlist is an arena of gate nodes wired together by index. Each gate
//! terminal is driven by exactly one [`Source`]: a package pin, another
//! gate's output, or a named net. A net is an alias bound to one producer
//! and fanned out to any number of terminals.
//!
//! The topology is validated and topologically sorted once, in
//! [`NetlistBuilder::build`]. Every [`Netlist::evaluate`] then declares fresh
//! gate instances and walks that order, so a producer is always evaluated
//! before any consumer reads it and each net is a snapshot of its producer.
//!
//! ## Example
//!
//! ```rust
//! use ic_netlist::gates::{GateKind, Terminal};
//! use ic_netlist::netlist::{NetSource, NetlistBuilder, Source};
//! use ic_netlist::pins::{PinId, PinMap};
//!
//! let mut b = NetlistBuilder::new();
//! let inv = b.gate("INV", GateKind::Not, 1);
//! let and = b.gate("AND", GateKind::And, 2);
//! let n = b.net("n", NetSource::Gate(inv));
//! b.connect(inv, Terminal::One, Source::Pin(PinId::new(1)));
//! b.connect(and, Terminal::One, Source::Net(n));
//! b.connect(and, Terminal::Two, Source::Pin(PinId::new(2)));
//! b.drive(PinId::new(3), Source::Gate(and));
//! let netlist = b.build().unwrap();
//!
//! let mut pins = PinMap::new(3);
//! pins.set(PinId::new(2), true).unwrap();
//! let eval = netlist.evaluate(&pins).unwrap();
//! netlist.drive(&eval, &mut pins).unwrap();
//! assert!(pins.get(PinId::new(3)).unwrap());
//! ```

use crate::gates::{Gate, GateError, GateKind, Signal, Terminal};
use crate::pins::{PinError, PinId, PinMap};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as FmtWrite;
use thiserror::Error;
use tracing::trace;

const TERMINALS: [Terminal; 2] = [Terminal::One, Terminal::Two];

/// Index of a gate node in its netlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GateId(usize);

/// Index of a named net in its netlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(usize);

/// The single producer a net is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetSource {
    Pin(PinId),
    Gate(GateId),
}

/// What drives a gate terminal or an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Pin(PinId),
    Gate(GateId),
    Net(NetId),
}

impl From<NetSource> for Source {
    fn from(src: NetSource) -> Self {
        match src {
            NetSource::Pin(p) => Source::Pin(p),
            NetSource::Gate(g) => Source::Gate(g),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetlistError {
    #[error("name declared twice: {0}")]
    DuplicateName(String),
    #[error("reference out of range: {0}")]
    RefOutOfRange(String),
    #[error("{gate} has no {terminal:?} terminal")]
    NoSuchTerminal { gate: String, terminal: Terminal },
    #[error("{gate} {terminal:?} is driven more than once")]
    MultiplyDriven { gate: String, terminal: Terminal },
    #[error("{gate} {terminal:?} is not driven")]
    Undriven { gate: String, terminal: Terminal },
    #[error("{0} is driven more than once")]
    DuplicateDrive(PinId),
    #[error("combinational loop through {}", .gates.join(", "))]
    Cycle { gates: Vec<String> },
    #[error(transparent)]
    Pin(#[from] PinError),
    #[error(transparent)]
    Gate(#[from] GateError),
}

#[derive(Debug, Clone)]
struct PendingNode {
    name: String,
    kind: GateKind,
    number: u32,
    inputs: [Option<Source>; 2],
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: GateKind,
    number: u32,
    inputs: Vec<Source>,
}

#[derive(Debug, Clone)]
struct Net {
    name: String,
    producer: NetSource,
}

#[derive(Debug, Clone, Copy)]
struct Drive {
    pin: PinId,
    source: Source,
}

/// Collects declarations and wiring; all validation happens in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct NetlistBuilder {
    nodes: Vec<PendingNode>,
    nets: Vec<Net>,
    drives: Vec<Drive>,
    names: HashSet<String>,
    errors: Vec<NetlistError>,
}

impl NetlistBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim_name(&mut self, name: &str) {
        if !self.names.insert(name.to_string()) {
            self.errors.push(NetlistError::DuplicateName(name.to_string()));
        }
    }

    /// Declare a gate; no wiring yet.
    pub fn gate(&mut self, name: &str, kind: GateKind, number: u32) -> GateId {
        self.claim_name(name);
        self.nodes.push(PendingNode {
            name: name.to_string(),
            kind,
            number,
            inputs: [None, None],
        });
        GateId(self.nodes.len() - 1)
    }

    /// Bind a named net to its producer.
    pub fn net(&mut self, name: &str, producer: NetSource) -> NetId {
        self.claim_name(name);
        self.nets.push(Net {
            name: name.to_string(),
            producer,
        });
        NetId(self.nets.len() - 1)
    }

    pub fn connect(&mut self, gate: GateId, terminal: Terminal, source: Source) -> &mut Self {
        let Some(node) = self.nodes.get_mut(gate.0) else {
            self.errors
                .push(NetlistError::RefOutOfRange(format!("gate #{}", gate.0)));
            return self;
        };
        if terminal.index() >= node.kind.arity() {
            self.errors.push(NetlistError::NoSuchTerminal {
                gate: node.name.clone(),
                terminal,
            });
            return self;
        }
        let slot = &mut node.inputs[terminal.index()];
        if slot.is_some() {
            self.errors.push(NetlistError::MultiplyDriven {
                gate: node.name.clone(),
                terminal,
            });
            return self;
        }
        *slot = Some(source);
        self
    }

    /// Connect one source to several terminals.
    pub fn fan_out(&mut self, source: Source, sinks: &[(GateId, Terminal)]) -> &mut Self {
        for &(gate, terminal) in sinks {
            self.connect(gate, terminal, source);
        }
        self
    }

    /// Write `source` to an output pin after evaluation.
    pub fn drive(&mut self, pin: PinId, source: Source) -> &mut Self {
        if self.drives.iter().any(|d| d.pin == pin) {
            self.errors.push(NetlistError::DuplicateDrive(pin));
        } else {
            self.drives.push(Drive { pin, source });
        }
        self
    }

    pub fn build(self) -> Result<Netlist, NetlistError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        let gate_count = self.nodes.len();
        let net_count = self.nets.len();
        let check = |src: &Source| -> Result<(), NetlistError> {
            match src {
                Source::Gate(g) if g.0 >= gate_count => {
                    Err(NetlistError::RefOutOfRange(format!("gate #{}", g.0)))
                }
                Source::Net(n) if n.0 >= net_count => {
                    Err(NetlistError::RefOutOfRange(format!("net #{}", n.0)))
                }
                _ => Ok(()),
            }
        };

        let mut nodes = Vec::with_capacity(gate_count);
        for pending in self.nodes {
            let mut inputs = Vec::with_capacity(pending.kind.arity());
            for terminal in TERMINALS.iter().take(pending.kind.arity()) {
                let src = pending.inputs[terminal.index()].ok_or_else(|| NetlistError::Undriven {
                    gate: pending.name.clone(),
                    terminal: *terminal,
                })?;
                check(&src)?;
                inputs.push(src);
            }
            nodes.push(Node {
                name: pending.name,
                kind: pending.kind,
                number: pending.number,
                inputs,
            });
        }
        for net in &self.nets {
            check(&Source::from(net.producer))?;
        }
        for drive in &self.drives {
            check(&drive.source)?;
        }

        let mut netlist = Netlist {
            nodes,
            nets: self.nets,
            drives: self.drives,
            order: Vec::new(),
            levels: Vec::new(),
            nets_by_producer: vec![Vec::new(); gate_count],
            pin_nets: Vec::new(),
        };
        for (idx, net) in netlist.nets.iter().enumerate() {
            match net.producer {
                NetSource::Gate(g) => netlist.nets_by_producer[g.0].push(NetId(idx)),
                NetSource::Pin(_) => netlist.pin_nets.push(NetId(idx)),
            }
        }
        netlist.schedule()?;
        Ok(netlist)
    }
}

/// A validated, topologically ordered gate netlist. Wiring is immutable.
#[derive(Debug, Clone)]
pub struct Netlist {
    nodes: Vec<Node>,
    nets: Vec<Net>,
    drives: Vec<Drive>,
    order: Vec<GateId>,
    levels: Vec<usize>,
    nets_by_producer: Vec<Vec<NetId>>,
    pin_nets: Vec<NetId>,
}

impl Netlist {
    /// The gate (if any) a source ultimately reads from.
    fn producer_gate(&self, src: &Source) -> Option<usize> {
        match src {
            Source::Gate(g) => Some(g.0),
            Source::Net(n) => match self.nets[n.0].producer {
                NetSource::Gate(g) => Some(g.0),
                NetSource::Pin(_) => None,
            },
            Source::Pin(_) => None,
        }
    }

    /// Kahn's algorithm; ties go to the earliest declared gate.
    fn schedule(&mut self) -> Result<(), NetlistError> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (idx, node) in self.nodes.iter().enumerate() {
            for src in &node.inputs {
                if let Some(p) = self.producer_gate(src) {
                    indegree[idx] += 1;
                    successors[p].push(idx);
                }
            }
        }
        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut levels = vec![1usize; n];
        while let Some(idx) = ready.pop_first() {
            order.push(GateId(idx));
            for &next in &successors[idx] {
                levels[next] = levels[next].max(levels[idx] + 1);
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.insert(next);
                }
            }
        }
        if order.len() != n {
            let gates = (0..n)
                .filter(|&i| indegree[i] > 0)
                .map(|i| self.nodes[i].name.clone())
                .collect();
            return Err(NetlistError::Cycle { gates });
        }
        self.order = order;
        self.levels = levels;
        Ok(())
    }

    pub fn gate_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn gate_id(&self, name: &str) -> Option<GateId> {
        self.nodes.iter().position(|n| n.name == name).map(GateId)
    }

    pub fn net_id(&self, name: &str) -> Option<NetId> {
        self.nets.iter().position(|n| n.name == name).map(NetId)
    }

    pub fn gate_name(&self, id: GateId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn gate_kind(&self, id: GateId) -> GateKind {
        self.nodes[id.0].kind
    }

    pub fn net_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.nets.iter().map(|n| n.name.as_str())
    }

    /// Evaluation order computed at build time.
    pub fn order(&self) -> &[GateId] {
        &self.order
    }

    /// Logic depth of a gate: 1 for gates fed only by pins.
    pub fn level(&self, id: GateId) -> usize {
        self.levels[id.0]
    }

    pub fn depth(&self) -> usize {
        self.levels.iter().copied().max().unwrap_or(0)
    }

    /// Every terminal wired to `source` exactly as declared.
    pub fn consumers(&self, source: Source) -> Vec<(GateId, Terminal)> {
        let mut out = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            for (t, src) in node.inputs.iter().enumerate() {
                if *src == source {
                    out.push((GateId(idx), TERMINALS[t]));
                }
            }
        }
        out
    }

    /// Output pins in declaration order.
    pub fn output_pins(&self) -> Vec<PinId> {
        self.drives.iter().map(|d| d.pin).collect()
    }

    /// Pins read by any gate terminal, net or drive.
    pub fn input_pins(&self) -> BTreeSet<PinId> {
        let mut pins = BTreeSet::new();
        let mut note = |src: Source| {
            if let Source::Pin(p) = src {
                pins.insert(p);
            }
        };
        self.nodes
            .iter()
            .flat_map(|n| n.inputs.iter().copied())
            .for_each(&mut note);
        self.nets.iter().for_each(|n| note(n.producer.into()));
        self.drives.iter().for_each(|d| note(d.source));
        pins
    }

    /// Declare fresh gates, bind pins and route every net in order.
    pub fn evaluate(&self, pins: &PinMap) -> Result<Evaluation<'_>, NetlistError> {
        let mut gates: Vec<Gate> = self
            .nodes
            .iter()
            .map(|n| Gate::new(n.kind, n.number))
            .collect();
        let mut outputs = vec![false; self.nodes.len()];
        let mut nets = vec![false; self.nets.len()];
        for net in &self.pin_nets {
            if let NetSource::Pin(p) = self.nets[net.0].producer {
                nets[net.0] = pins.get(p)?;
            }
        }
        for id in &self.order {
            let node = &self.nodes[id.0];
            for (t, src) in node.inputs.iter().enumerate() {
                let level = match src {
                    Source::Pin(p) => pins.get(*p)?,
                    Source::Gate(g) => outputs[g.0],
                    Source::Net(n) => nets[n.0],
                };
                gates[id.0].set_terminal(TERMINALS[t], level)?;
            }
            let out = gates[id.0].output();
            outputs[id.0] = out;
            trace!(gate = %node.name, kind = %node.kind, output = out, "evaluated");
            for net in &self.nets_by_producer[id.0] {
                nets[net.0] = out;
            }
        }
        Ok(Evaluation {
            netlist: self,
            gates,
            outputs,
            nets,
        })
    }

    /// Write every output drive into `pins`.
    pub fn drive(&self, eval: &Evaluation<'_>, pins: &mut PinMap) -> Result<(), NetlistError> {
        for drive in &self.drives {
            let level = eval.resolve(drive.source, pins)?;
            pins.set(drive.pin, level)?;
        }
        Ok(())
    }

    fn format_source(&self, src: &Source) -> String {
        match src {
            Source::Pin(p) => p.to_string(),
            Source::Gate(g) => self.nodes[g.0].name.clone(),
            Source::Net(n) => self.nets[n.0].name.clone(),
        }
    }

    /// Stable text rendering of the wiring, one declaration per line.
    pub fn canonical_text(&self) -> String {
        let mut buf = String::new();
        let _ = writeln!(buf, "NETLIST v0");
        let _ = writeln!(buf, "GATES m={}", self.nodes.len());
        let _ = writeln!(buf, "NETS n={}", self.nets.len());
        for node in &self.nodes {
            let args: Vec<String> = node.inputs.iter().map(|s| self.format_source(s)).collect();
            let _ = writeln!(
                buf,
                "{}#{} = {}({})",
                node.name,
                node.number,
                node.kind,
                args.join(",")
            );
        }
        for net in &self.nets {
            let _ = writeln!(buf, "{} = {}", net.name, self.format_source(&net.producer.into()));
        }
        for drive in &self.drives {
            let _ = writeln!(buf, "{} = {}", drive.pin, self.format_source(&drive.source));
        }
        buf
    }

    /// Hex BLAKE3 of [`canonical_text`](Self::canonical_text).
    pub fn hash(&self) -> String {
        hex::encode(blake3::hash(self.canonical_text().as_bytes()).as_bytes())
    }
}

/// Gate instances and net snapshots from one evaluation pass.
#[derive(Debug, Clone)]
pub struct Evaluation<'a> {
    netlist: &'a Netlist,
    gates: Vec<Gate>,
    outputs: Vec<Signal>,
    nets: Vec<Signal>,
}

impl<'a> Evaluation<'a> {
    fn resolve(&self, src: Source, pins: &PinMap) -> Result<Signal, PinError> {
        match src {
            Source::Pin(p) => pins.get(p),
            Source::Gate(g) => Ok(self.outputs[g.0]),
            Source::Net(n) => Ok(self.nets[n.0]),
        }
    }

    pub fn gate(&self, name: &str) -> Option<&Gate> {
        self.netlist.gate_id(name).map(|id| &self.gates[id.0])
    }

    pub fn output_of(&self, name: &str) -> Option<Signal> {
        self.netlist.gate_id(name).map(|id| self.outputs[id.0])
    }

    pub fn net(&self, name: &str) -> Option<Signal> {
        self.netlist.net_id(name).map(|id| self.nets[id.0])
    }

    /// Gates in the order they were evaluated.
    pub fn gates_in_order(&self) -> impl Iterator<Item = (&'a str, &Gate)> + '_ {
        let netlist: &'a Netlist = self.netlist;
        netlist
            .order
            .iter()
            .map(move |id| (netlist.nodes[id.0].name.as_str(), &self.gates[id.0]))
    }

    pub fn nets(&self) -> impl Iterator<Item = (&'a str, Signal)> + '_ {
        let netlist: &'a Netlist = self.netlist;
        netlist
            .nets
            .iter()
            .zip(self.nets.iter())
            .map(|(net, level)| (net.name.as_str(), *level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(n: u16) -> PinId {
        PinId::new(n)
    }

    /// XOR from four NANDs, declared out of dependency order on purpose.
    fn nand_xor() -> Netlist {
        let mut b = NetlistBuilder::new();
        let out = b.gate("OUT", GateKind::Nand, 4);
        let left = b.gate("L", GateKind::Nand, 2);
        let right = b.gate("R", GateKind::Nand, 3);
        let mid = b.gate("M", GateKind::Nand, 1);
        let m = b.net("m", NetSource::Gate(mid));
        let a = b.net("a", NetSource::Pin(pin(1)));
        b.connect(mid, Terminal::One, Source::Net(a))
            .connect(mid, Terminal::Two, Source::Pin(pin(2)));
        b.fan_out(Source::Net(m), &[(left, Terminal::Two), (right, Terminal::One)]);
        b.connect(left, Terminal::One, Source::Net(a));
        b.connect(right, Terminal::Two, Source::Pin(pin(2)));
        b.connect(out, Terminal::One, Source::Gate(left))
            .connect(out, Terminal::Two, Source::Gate(right));
        b.drive(pin(3), Source::Gate(out));
        b.build().unwrap()
    }

    fn run(netlist: &Netlist, a: bool, b: bool) -> bool {
        let mut pins = PinMap::new(3);
        pins.set(pin(1), a).unwrap();
        pins.set(pin(2), b).unwrap();
        let eval = netlist.evaluate(&pins).unwrap();
        netlist.drive(&eval, &mut pins).unwrap();
        pins.get(pin(3)).unwrap()
    }

    #[test]
    fn evaluates_in_dependency_order() {
        let netlist = nand_xor();
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            assert_eq!(run(&netlist, a, b), a != b, "({a}, {b})");
        }
        let order: Vec<&str> = netlist.order().iter().map(|id| netlist.gate_name(*id)).collect();
        assert_eq!(order, vec!["M", "L", "R", "OUT"]);
        assert_eq!(netlist.depth(), 3);
        assert_eq!(netlist.level(netlist.gate_id("OUT").unwrap()), 3);
    }

    #[test]
    fn nets_are_snapshots_of_their_producer() {
        let netlist = nand_xor();
        let mut pins = PinMap::new(3);
        pins.set(pin(1), true).unwrap();
        pins.set(pin(2), true).unwrap();
        let eval = netlist.evaluate(&pins).unwrap();
        assert_eq!(eval.net("m"), eval.output_of("M"));
        assert_eq!(eval.net("a"), Some(true));
        assert_eq!(eval.gate("L").unwrap().terminal(Terminal::Two), Some(false));
        assert_eq!(eval.gates_in_order().count(), 4);
    }

    #[test]
    fn detects_combinational_loops() {
        let mut b = NetlistBuilder::new();
        let x = b.gate("X", GateKind::Nor, 1);
        let y = b.gate("Y", GateKind::Nor, 2);
        let fed = b.gate("FED", GateKind::Buffer, 3);
        b.connect(x, Terminal::One, Source::Pin(pin(1)))
            .connect(x, Terminal::Two, Source::Gate(y));
        b.connect(y, Terminal::One, Source::Gate(x))
            .connect(y, Terminal::Two, Source::Pin(pin(2)));
        b.connect(fed, Terminal::One, Source::Gate(y));
        match b.build() {
            Err(NetlistError::Cycle { gates }) => assert_eq!(gates, vec!["X", "Y", "FED"]),
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_wiring() {
        let mut b = NetlistBuilder::new();
        let inv = b.gate("INV", GateKind::Not, 1);
        b.connect(inv, Terminal::Two, Source::Pin(pin(1)));
        assert!(matches!(b.build(), Err(NetlistError::NoSuchTerminal { .. })));

        let mut b = NetlistBuilder::new();
        let and = b.gate("AND", GateKind::And, 1);
        b.connect(and, Terminal::One, Source::Pin(pin(1)));
        assert_eq!(
            b.build().unwrap_err(),
            NetlistError::Undriven {
                gate: "AND".into(),
                terminal: Terminal::Two
            }
        );

        let mut b = NetlistBuilder::new();
        let buf = b.gate("BUF", GateKind::Buffer, 1);
        b.connect(buf, Terminal::One, Source::Pin(pin(1)));
        b.connect(buf, Terminal::One, Source::Pin(pin(2)));
        assert!(matches!(b.build(), Err(NetlistError::MultiplyDriven { .. })));

        let mut b = NetlistBuilder::new();
        b.gate("G", GateKind::Buffer, 1);
        b.net("G", NetSource::Pin(pin(1)));
        assert_eq!(b.build().unwrap_err(), NetlistError::DuplicateName("G".into()));
    }

    #[test]
    fn reading_missing_pins_fails() {
        let netlist = nand_xor();
        let pins = PinMap::new(1);
        assert!(matches!(netlist.evaluate(&pins), Err(NetlistError::Pin(_))));
    }

    #[test]
    fn canonical_text_and_hash_are_stable() {
        let a = nand_xor();
        let b = nand_xor();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);
        let text = a.canonical_text();
        assert!(text.starts_with("NETLIST v0\nGATES m=4\nNETS n=2\n"));
        assert!(text.contains("M#1 = NAND(a,Pin2)\n"));
        assert!(text.contains("m = M\n"));
        assert!(text.ends_with("Pin3 = OUT\n"));
    }

    #[test]
    fn reports_consumers_and_pins() {
        let netlist = nand_xor();
        let m = netlist.net_id("m").unwrap();
        assert_eq!(netlist.consumers(Source::Net(m)).len(), 2);
        assert_eq!(netlist.output_pins(), vec![pin(3)]);
        let inputs: Vec<PinId> = netlist.input_pins().into_iter().collect();
        assert_eq!(inputs, vec![pin(1), pin(2)]);
    }
}
