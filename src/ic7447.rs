//! # IC 7447: BCD to seven-segment decoder/driver
//!
//! Gate-level model of the common-anode 7447. The netlist is split into five
//! sections joined by ten named nets (`lineA`..`lineJ`):
//!
//! | Section | Gates | Role |
//! |---|---|---|
//! | A | `AA`..`AE` | input conditioning: gated complements of A, B, C, inverted D, buffered LT |
//! | B | `BA`..`BC` | blanking / lamp-test control, `BB1_2 → BB3 → BB4 → BB5 → BB → BA` |
//! | C | `CA`..`CD` | true data lines, forced HIGH while blanking |
//! | D | `DA`..`DY` | segment pre-drivers and their reduction trees |
//! | E | `EA`..`EH` | final OR drivers, one per segment |
//!
//! Outputs are raw pin levels and active-low: a segment is lit when its pin
//! is LOW.
//!
//! | Pin | Signal | Pin | Signal |
//! |---|---|---|---|
//! | 7 | A | 13 | a |
//! | 1 | B | 12 | b |
//! | 2 | C | 11 | c |
//! | 6 | D | 10 | d |
//! | 3 | LT (active low) | 9 | e |
//! | 5 | RBI (active low) | 15 | f |
//! | 4 | BI/RBO, not wired | 14 | g |
//!
//! ## Example
//!
//! ```rust
//! use ic_netlist::ic::IntegratedCircuit;
//! use ic_netlist::ic7447::{Ic7447, Segments};
//!
//! let chip = Ic7447::new(true, false, 16, false, false, false, false).unwrap();
//! let segments = Segments::from_pins(&chip.process().unwrap()).unwrap();
//! assert_eq!(segments.pattern(), "0000001");
//! ```

use crate::gates::{signal_from_value, GateKind, Signal};
use crate::ic::{IcError, IntegratedCircuit, Rails};
use crate::netlist::{Evaluation, NetSource, Netlist, NetlistBuilder, NetlistError, Source};
use crate::pins::{PinError, PinId, PinMap};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Package pin assignment.
pub mod pinout {
    use crate::pins::PinId;

    pub const B: PinId = PinId::new(1);
    pub const C: PinId = PinId::new(2);
    /// Lamp test, active low.
    pub const LT: PinId = PinId::new(3);
    /// Blanking input / ripple-blanking output. Not wired.
    pub const BI_RBO: PinId = PinId::new(4);
    /// Ripple-blanking input, active low.
    pub const RBI: PinId = PinId::new(5);
    pub const D: PinId = PinId::new(6);
    pub const A: PinId = PinId::new(7);
    pub const GND: PinId = PinId::new(8);
    pub const SEG_E: PinId = PinId::new(9);
    pub const SEG_D: PinId = PinId::new(10);
    pub const SEG_C: PinId = PinId::new(11);
    pub const SEG_B: PinId = PinId::new(12);
    pub const SEG_A: PinId = PinId::new(13);
    pub const SEG_G: PinId = PinId::new(14);
    pub const SEG_F: PinId = PinId::new(15);
    pub const VCC: PinId = PinId::new(16);

    /// Segment pins in a..g order.
    pub const SEGMENTS: [PinId; 7] = [SEG_A, SEG_B, SEG_C, SEG_D, SEG_E, SEG_F, SEG_G];
}

/// Standard 16-pin DIP.
pub const TERMINAL_COUNT: u16 = 16;

// Highest pin the netlist reads or writes (segment f).
const HIGHEST_SIGNAL_PIN: u16 = 15;

/// One BCD digit, D is the most significant bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Bcd {
    pub d: Signal,
    pub c: Signal,
    pub b: Signal,
    pub a: Signal,
}

impl Bcd {
    pub fn new(d: Signal, c: Signal, b: Signal, a: Signal) -> Self {
        Bcd { d, c, b, a }
    }

    /// The low nibble of `code`.
    pub fn from_nibble(code: u8) -> Self {
        Bcd {
            d: code & 0b1000 != 0,
            c: code & 0b0100 != 0,
            b: code & 0b0010 != 0,
            a: code & 0b0001 != 0,
        }
    }

    pub fn code(&self) -> u8 {
        (self.d as u8) << 3 | (self.c as u8) << 2 | (self.b as u8) << 1 | self.a as u8
    }
}

impl fmt::Display for Bcd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in [self.d, self.c, self.b, self.a] {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Active-low control inputs. HIGH means inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Controls {
    /// Lamp test: LOW lights every segment.
    pub lt: Signal,
    /// Ripple-blanking input: LOW blanks a zero.
    pub rbi: Signal,
}

impl Controls {
    pub const INACTIVE: Controls = Controls { lt: true, rbi: true };

    pub fn lamp_test() -> Self {
        Controls { lt: false, rbi: true }
    }

    pub fn ripple_blanking() -> Self {
        Controls { lt: true, rbi: false }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Controls::INACTIVE
    }
}

pub const SEGMENT_NAMES: [char; 7] = ['a', 'b', 'c', 'd', 'e', 'f', 'g'];

/// Raw segment pin levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Segments {
    pub a: Signal,
    pub b: Signal,
    pub c: Signal,
    pub d: Signal,
    pub e: Signal,
    pub f: Signal,
    pub g: Signal,
}

impl Segments {
    pub fn from_pins(pins: &PinMap) -> Result<Self, PinError> {
        Ok(Segments {
            a: pins.get(pinout::SEG_A)?,
            b: pins.get(pinout::SEG_B)?,
            c: pins.get(pinout::SEG_C)?,
            d: pins.get(pinout::SEG_D)?,
            e: pins.get(pinout::SEG_E)?,
            f: pins.get(pinout::SEG_F)?,
            g: pins.get(pinout::SEG_G)?,
        })
    }

    /// Pin levels in a..g order.
    pub fn levels(&self) -> [Signal; 7] {
        [self.a, self.b, self.c, self.d, self.e, self.f, self.g]
    }

    /// Pin levels as `0`/`1` characters, a first.
    pub fn pattern(&self) -> String {
        self.levels()
            .iter()
            .map(|&level| if level { '1' } else { '0' })
            .collect()
    }

    /// Which segments glow on a common-anode display.
    pub fn lit(&self) -> [bool; 7] {
        self.levels().map(|level| !level)
    }

    pub fn is_blank(&self) -> bool {
        self.levels().iter().all(|&level| level)
    }
}

/// The decoder chip with its current pin-side stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ic7447 {
    rails: Rails,
    terminals: u16,
    bcd: Bcd,
    controls: Controls,
}

impl Ic7447 {
    /// Build a chip on a `terminals`-pin package with LT and RBI inactive.
    pub fn new(
        pwr: Signal,
        gnd: Signal,
        terminals: u16,
        d: Signal,
        c: Signal,
        b: Signal,
        a: Signal,
    ) -> Result<Self, IcError> {
        if terminals < HIGHEST_SIGNAL_PIN {
            return Err(IcError::TooFewTerminals {
                required: HIGHEST_SIGNAL_PIN,
                got: terminals,
            });
        }
        Ok(Ic7447 {
            rails: Rails::new(pwr, gnd),
            terminals,
            bcd: Bcd::new(d, c, b, a),
            controls: Controls::INACTIVE,
        })
    }

    /// A 16-pin chip; cannot fail.
    pub fn with_bcd(rails: Rails, bcd: Bcd) -> Self {
        Ic7447 {
            rails,
            terminals: TERMINAL_COUNT,
            bcd,
            controls: Controls::INACTIVE,
        }
    }

    /// Build from a JSON request `{pwr, gnd, d, c, b, a, lt?, rbi?, terminals?}`.
    ///
    /// Every level must be a JSON boolean; anything else is a type mismatch.
    pub fn from_request(request: &Value) -> Result<Self, IcError> {
        let Value::Object(fields) = request else {
            return Err(IcError::InvalidRequest("expected a JSON object".into()));
        };
        let level = |key: &str| signal_from_value(key, fields.get(key).unwrap_or(&Value::Null));
        let optional = |key: &str, default: Signal| match fields.get(key) {
            None => Ok(default),
            Some(value) => signal_from_value(key, value),
        };
        let terminals = match fields.get("terminals") {
            None => TERMINAL_COUNT,
            Some(value) => value
                .as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .ok_or_else(|| IcError::InvalidRequest(format!("terminals: {value}")))?,
        };
        let rails = Rails::from_values(
            fields.get("pwr").unwrap_or(&Value::Null),
            fields.get("gnd").unwrap_or(&Value::Null),
        )?;
        let chip = Ic7447::new(
            rails.pwr,
            rails.gnd,
            terminals,
            level("d")?,
            level("c")?,
            level("b")?,
            level("a")?,
        )?;
        Ok(chip.with_controls(Controls {
            lt: optional("lt", true)?,
            rbi: optional("rbi", true)?,
        }))
    }

    pub fn with_controls(mut self, controls: Controls) -> Self {
        self.controls = controls;
        self
    }

    pub fn set_controls(&mut self, controls: Controls) {
        self.controls = controls;
    }

    pub fn set_bcd(&mut self, bcd: Bcd) {
        self.bcd = bcd;
    }

    pub fn bcd(&self) -> Bcd {
        self.bcd
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    /// Evaluate and read back the segment pins.
    pub fn segments(&self) -> Result<Segments, IcError> {
        Ok(Segments::from_pins(&self.process()?)?)
    }

    /// Full gate and net state of one evaluation; `None` when the chip is not live.
    pub fn trace(&self) -> Result<Option<Evaluation<'static>>, IcError> {
        if !self.rails.is_live() {
            return Ok(None);
        }
        let pins = self.inputs()?;
        Ok(Some(netlist()?.evaluate(&pins)?))
    }
}

impl IntegratedCircuit for Ic7447 {
    fn name(&self) -> &str {
        "7447"
    }

    fn rails(&self) -> Rails {
        self.rails
    }

    fn terminal_count(&self) -> u16 {
        self.terminals
    }

    fn representative_pin(&self) -> PinId {
        pinout::SEG_A
    }

    fn inputs(&self) -> Result<PinMap, IcError> {
        let mut pins = self.terminal_identify();
        pins.set(pinout::A, self.bcd.a)?;
        pins.set(pinout::B, self.bcd.b)?;
        pins.set(pinout::C, self.bcd.c)?;
        pins.set(pinout::D, self.bcd.d)?;
        pins.set(pinout::LT, self.controls.lt)?;
        pins.set(pinout::RBI, self.controls.rbi)?;
        Ok(pins)
    }

    fn drive(&self, pins: &mut PinMap) -> Result<(), IcError> {
        debug!(
            bcd = %self.bcd,
            lt = self.controls.lt,
            rbi = self.controls.rbi,
            "decoding"
        );
        let netlist = netlist()?;
        let eval = netlist.evaluate(pins)?;
        netlist.drive(&eval, pins)?;
        Ok(())
    }
}

static NETLIST: OnceLock<Result<Netlist, NetlistError>> = OnceLock::new();

/// The decoder wiring, validated and ordered on first use.
pub fn netlist() -> Result<&'static Netlist, NetlistError> {
    NETLIST.get_or_init(build_netlist).as_ref().map_err(Clone::clone)
}

fn build_netlist() -> Result<Netlist, NetlistError> {
    use crate::gates::Terminal::{One, Two};
    use GateKind::{And, Buffer, Nand, Not, Or};

    let mut b = NetlistBuilder::new();

    // Section A: input conditioning
    let aa = b.gate("AA", Nand, 1);
    let ab = b.gate("AB", Nand, 2);
    let ac = b.gate("AC", Nand, 3);
    let ad = b.gate("AD", Not, 1);
    let ae = b.gate("AE", Buffer, 1);

    // Section B: blanking / lamp-test control
    let ba = b.gate("BA", Not, 2);
    let bb1_2 = b.gate("BB1_2", And, 1);
    let bb3 = b.gate("BB3", And, 1);
    let bb4 = b.gate("BB4", And, 1);
    let bb5 = b.gate("BB5", And, 1);
    let bb = b.gate("BB", And, 1);
    let bc = b.gate("BC", Not, 2);

    // Section C: true data lines
    let ca = b.gate("CA", Nand, 4);
    let cb = b.gate("CB", Nand, 5);
    let cc = b.gate("CC", Nand, 6);
    let cd = b.gate("CD", Nand, 7);

    // Section D: segment pre-drivers
    let da = b.gate("DA", And, 1);
    let db = b.gate("DB", And, 2);
    let dc1_2 = b.gate("DC1_2", And, 3);
    let dc3 = b.gate("DC3", And, 3);
    let dc = b.gate("DC", And, 3);
    let dd = b.gate("DD", And, 4);
    let de1_2 = b.gate("DE1_2", And, 5);
    let de = b.gate("DE", And, 5);
    let df1_2 = b.gate("DF1_2", And, 6);
    let df = b.gate("DF", And, 6);
    let dh = b.gate("DH", And, 7);
    let di1_2 = b.gate("DI1_2", And, 8);
    let di = b.gate("DI", And, 8);
    let dj1_2 = b.gate("DJ1_2", And, 9);
    let dj = b.gate("DJ", And, 9);
    let dk1_2 = b.gate("DK1_2", And, 10);
    let dk = b.gate("DK", And, 10);
    let dl1_2 = b.gate("DL1_2", And, 11);
    let dl = b.gate("DL", And, 11);
    let dm = b.gate("DM", Buffer, 2);
    let dp = b.gate("DP", And, 12);
    let dq = b.gate("DQ", And, 13);
    let dv = b.gate("DV", And, 14);
    let dw1_2 = b.gate("DW1_2", And, 15);
    let dw = b.gate("DW", And, 15);
    let dx1_2 = b.gate("DX1_2", And, 16);
    let dx = b.gate("DX", And, 16);
    let dy1_2 = b.gate("DY1_2", And, 17);
    let dy3 = b.gate("DY3", And, 17);
    let dy = b.gate("DY", And, 17);

    // Section E: segment drivers
    let ea1_2 = b.gate("EA1_2", Or, 1);
    let ea = b.gate("EA", Or, 1);
    let eb1_2 = b.gate("EB1_2", Or, 2);
    let eb = b.gate("EB", Or, 2);
    let ec = b.gate("EC", Or, 3);
    let ed1_2 = b.gate("ED1_2", Or, 4);
    let ed = b.gate("ED", Or, 4);
    let ee = b.gate("EE", Or, 5);
    let ef1_2 = b.gate("EF1_2", Or, 6);
    let ef = b.gate("EF", Or, 6);
    let eh = b.gate("EH", Or, 7);

    // Pin bindings
    b.connect(aa, One, Source::Pin(pinout::A));
    b.connect(ab, One, Source::Pin(pinout::B));
    b.connect(ac, One, Source::Pin(pinout::C));
    b.connect(ad, One, Source::Pin(pinout::D));
    b.connect(ae, One, Source::Pin(pinout::LT));
    b.connect(bc, One, Source::Pin(pinout::RBI));

    // lineA: buffered LT, gates the complements and the zero term of g
    let line_a = b.net("lineA", NetSource::Gate(ae));
    b.fan_out(
        Source::Net(line_a),
        &[(aa, Two), (ab, Two), (ac, Two), (bb1_2, Two), (dy1_2, One)],
    );

    // lineE, lineH, lineI, lineJ: complements of A, B, C, D
    let line_e = b.net("lineE", NetSource::Gate(aa));
    let line_h = b.net("lineH", NetSource::Gate(ab));
    let line_i = b.net("lineI", NetSource::Gate(ac));
    let line_j = b.net("lineJ", NetSource::Gate(ad));

    // lineB: RBI asserted, LT idle and a zero digit pull it LOW
    b.connect(bb1_2, One, Source::Gate(bc));
    b.connect(bb3, One, Source::Gate(bb1_2))
        .connect(bb3, Two, Source::Net(line_j));
    b.connect(bb4, One, Source::Gate(bb3))
        .connect(bb4, Two, Source::Net(line_i));
    b.connect(bb5, One, Source::Gate(bb4))
        .connect(bb5, Two, Source::Net(line_h));
    b.connect(bb, One, Source::Gate(bb5))
        .connect(bb, Two, Source::Net(line_e));
    b.connect(ba, One, Source::Gate(bb));
    let line_b = b.net("lineB", NetSource::Gate(ba));
    b.fan_out(
        Source::Net(line_b),
        &[(ca, Two), (cb, Two), (cc, Two), (cd, Two)],
    );

    // True lines: lineG = A, lineC = B, lineF = C, lineD = D
    b.connect(ca, One, Source::Net(line_e));
    b.connect(cb, One, Source::Net(line_h));
    b.connect(cc, One, Source::Net(line_i));
    b.connect(cd, One, Source::Net(line_j));
    let line_c = b.net("lineC", NetSource::Gate(cb));
    let line_d = b.net("lineD", NetSource::Gate(cd));
    let line_f = b.net("lineF", NetSource::Gate(cc));
    let line_g = b.net("lineG", NetSource::Gate(ca));

    b.fan_out(
        Source::Net(line_c),
        &[
            (da, One),
            (dd, One),
            (df1_2, Two),
            (di1_2, Two),
            (dl1_2, Two),
            (dq, Two),
            (dv, One),
            (dx1_2, Two),
        ],
    );
    b.fan_out(Source::Net(line_d), &[(da, Two), (dd, Two), (dh, Two)]);
    b.fan_out(
        Source::Net(line_e),
        &[(db, One), (df, Two), (di, Two), (dk, Two)],
    );
    b.fan_out(
        Source::Net(line_f),
        &[
            (db, Two),
            (de1_2, One),
            (df1_2, One),
            (dh, One),
            (dk1_2, One),
            (dl1_2, One),
            (dp, Two),
            (dx1_2, One),
        ],
    );
    b.fan_out(
        Source::Net(line_g),
        &[
            (dc, Two),
            (de, Two),
            (dj, Two),
            (dl, Two),
            (dm, One),
            (dq, One),
            (dw, Two),
            (dx, Two),
        ],
    );
    b.fan_out(
        Source::Net(line_h),
        &[
            (dc3, Two),
            (de1_2, Two),
            (dj1_2, Two),
            (dk1_2, Two),
            (dp, One),
            (dy, Two),
        ],
    );
    b.fan_out(
        Source::Net(line_i),
        &[
            (dc1_2, Two),
            (di1_2, One),
            (dj1_2, One),
            (dv, Two),
            (dw1_2, Two),
            (dy3, Two),
        ],
    );
    b.fan_out(
        Source::Net(line_j),
        &[(dc1_2, One), (dw1_2, One), (dy1_2, Two)],
    );

    // Reduction trees
    for (stage, next) in [
        (dc1_2, dc3),
        (dc3, dc),
        (de1_2, de),
        (df1_2, df),
        (di1_2, di),
        (dj1_2, dj),
        (dk1_2, dk),
        (dl1_2, dl),
        (dw1_2, dw),
        (dx1_2, dx),
        (dy1_2, dy3),
        (dy3, dy),
    ] {
        b.connect(next, One, Source::Gate(stage));
    }

    // Segment drivers
    for (driver, first, second) in [
        (ea1_2, dc, db),
        (ea, ea1_2, da),
        (eb1_2, df, de),
        (eb, eb1_2, dd),
        (ec, dh, di),
        (ed1_2, dl, dk),
        (ed, ed1_2, dj),
        (ee, dm, dp),
        (ef1_2, dw, dv),
        (ef, ef1_2, dq),
        (eh, dx, dy),
    ] {
        b.connect(driver, One, Source::Gate(first))
            .connect(driver, Two, Source::Gate(second));
    }
    for (pin, driver) in pinout::SEGMENTS.into_iter().zip([ea, eb, ec, ed, ee, ef, eh]) {
        b.drive(pin, Source::Gate(driver));
    }

    b.build()
}

/// One row of the decoder truth table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TruthRow {
    pub bcd: Bcd,
    pub segments: Segments,
    pub pins: PinMap,
}

/// Evaluate all sixteen input codes as independent requests.
pub fn truth_table(rails: Rails, controls: Controls) -> Result<Vec<TruthRow>, IcError> {
    (0u8..16)
        .into_par_iter()
        .map(|code| -> Result<TruthRow, IcError> {
            let bcd = Bcd::from_nibble(code);
            let pins = Ic7447::with_bcd(rails, bcd).with_controls(controls).process()?;
            Ok(TruthRow {
                bcd,
                segments: Segments::from_pins(&pins)?,
                pins,
            })
        })
        .collect()
}
