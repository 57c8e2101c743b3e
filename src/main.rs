use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use ic_netlist::config::{BenchConfig, OutputFormat};
use ic_netlist::gates::level_name;
use ic_netlist::ic7447::{self, Bcd, Controls, Ic7447, Segments, SEGMENT_NAMES};
use ic_netlist::netlist::Source;
use ic_netlist::{IntegratedCircuit, Rails};
use rayon::prelude::*;
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "ic7447", version, about = "Gate-level 7447 BCD to seven-segment decoder")]
struct Cli {
    /// Verbosity (-v info, -vv debug, -vvv per-gate trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Bench configuration file; defaults to a discovered ic7447.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one BCD code
    Eval {
        #[arg(value_parser = clap::value_parser!(u8).range(0..16))]
        code: u8,
        #[command(flatten)]
        bench: BenchArgs,
    },
    /// Decode all sixteen codes
    Table {
        #[command(flatten)]
        bench: BenchArgs,
    },
    /// Show every gate and net for one code
    Trace {
        #[arg(value_parser = clap::value_parser!(u8).range(0..16))]
        code: u8,
        #[command(flatten)]
        bench: BenchArgs,
    },
    /// Describe the decoder netlist
    Topology {
        /// Print the canonical wiring text instead of the summary
        #[arg(long, default_value_t = false)]
        canonical: bool,
    },
    /// Evaluate JSON requests, one result line per request
    Request {
        /// JSON file holding an object or an array of objects; `-` reads stdin
        input: PathBuf,
    },
}

#[derive(Args)]
struct BenchArgs {
    #[arg(long)]
    pwr: Option<bool>,
    #[arg(long)]
    gnd: Option<bool>,
    /// Lamp test level (active low)
    #[arg(long)]
    lt: Option<bool>,
    /// Ripple-blanking input level (active low)
    #[arg(long)]
    rbi: Option<bool>,
    #[arg(long)]
    terminals: Option<u16>,
}

impl BenchArgs {
    fn rails(&self, config: &BenchConfig) -> Rails {
        let base = config.rails();
        Rails::new(self.pwr.unwrap_or(base.pwr), self.gnd.unwrap_or(base.gnd))
    }

    fn controls(&self, config: &BenchConfig) -> Controls {
        let base = config.controls();
        Controls {
            lt: self.lt.unwrap_or(base.lt),
            rbi: self.rbi.unwrap_or(base.rbi),
        }
    }

    fn chip(&self, config: &BenchConfig, code: u8) -> Result<Ic7447> {
        let rails = self.rails(config);
        let bcd = Bcd::from_nibble(code);
        let terminals = self.terminals.unwrap_or_else(|| config.terminals());
        let chip = Ic7447::new(rails.pwr, rails.gnd, terminals, bcd.d, bcd.c, bcd.b, bcd.a)?;
        Ok(chip.with_controls(self.controls(config)))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let format = cli.format.unwrap_or_else(|| config.format());

    match cli.command {
        Commands::Eval { code, bench } => eval(&bench.chip(&config, code)?, format)?,
        Commands::Table { bench } => table(bench.rails(&config), bench.controls(&config), format)?,
        Commands::Trace { code, bench } => trace(&bench.chip(&config, code)?, format)?,
        Commands::Topology { canonical } => topology(canonical, format)?,
        Commands::Request { input } => request(&input)?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BenchConfig> {
    if let Some(path) = path {
        return Ok(BenchConfig::load(path)?);
    }
    Ok(match BenchConfig::discover() {
        Some((config, path)) => {
            info!(path = %path.display(), "using bench config");
            config
        }
        None => BenchConfig::default(),
    })
}

fn lit_letters(segments: &Segments) -> String {
    let letters: String = SEGMENT_NAMES
        .iter()
        .zip(segments.lit())
        .filter(|(_, lit)| *lit)
        .map(|(name, _)| *name)
        .collect();
    if letters.is_empty() {
        "-".to_string()
    } else {
        letters
    }
}

fn eval(chip: &Ic7447, format: OutputFormat) -> Result<()> {
    let pins = chip.process()?;
    let segments = Segments::from_pins(&pins)?;
    match format {
        OutputFormat::Json => {
            let record = json!({
                "bcd": chip.bcd(),
                "controls": chip.controls(),
                "rails": chip.rails(),
                "pattern": segments.pattern(),
                "segments": segments,
                "pins": pins,
            });
            println!("{record}");
        }
        OutputFormat::Text => {
            println!("7447 BCD {} ({})", chip.bcd(), chip.bcd().code());
            println!(
                "segments a..g: {}  lit: {}",
                segments.pattern(),
                lit_letters(&segments)
            );
            println!(
                "{} (segment a): {}",
                chip.representative_pin(),
                level_name(chip.output()?)
            );
            print!("{pins}");
        }
    }
    Ok(())
}

fn table(rails: Rails, controls: Controls, format: OutputFormat) -> Result<()> {
    let rows = ic7447::truth_table(rails, controls)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&rows)?),
        OutputFormat::Text => {
            println!("code  DCBA  abcdefg  lit");
            for row in &rows {
                println!(
                    "{:>4}  {}  {}  {}",
                    row.bcd.code(),
                    row.bcd,
                    row.segments.pattern(),
                    lit_letters(&row.segments)
                );
            }
        }
    }
    Ok(())
}

fn trace(chip: &Ic7447, format: OutputFormat) -> Result<()> {
    let Some(eval) = chip.trace()? else {
        match format {
            OutputFormat::Json => println!("{}", json!({ "live": false })),
            OutputFormat::Text => println!("chip not live; every pin stays LOW"),
        }
        return Ok(());
    };
    match format {
        OutputFormat::Json => {
            let gates: Vec<Value> = eval
                .gates_in_order()
                .map(|(name, gate)| {
                    json!({
                        "name": name,
                        "kind": gate.kind().as_str(),
                        "output": gate.output(),
                    })
                })
                .collect();
            let nets: serde_json::Map<String, Value> = eval
                .nets()
                .map(|(name, level)| (name.to_string(), Value::Bool(level)))
                .collect();
            println!("{}", json!({ "live": true, "gates": gates, "nets": nets }));
        }
        OutputFormat::Text => {
            for (name, gate) in eval.gates_in_order() {
                println!("[{name}] {gate}");
            }
            println!("nets:");
            for (name, level) in eval.nets() {
                println!("  {name:<6}: {}", level_name(level));
            }
        }
    }
    Ok(())
}

fn topology(canonical: bool, format: OutputFormat) -> Result<()> {
    let netlist = ic7447::netlist()?;
    if canonical {
        print!("{}", netlist.canonical_text());
        return Ok(());
    }
    let fan_out: Vec<(String, Vec<String>)> = netlist
        .net_names()
        .map(|name| -> Result<(String, Vec<String>)> {
            let id = netlist
                .net_id(name)
                .ok_or_else(|| anyhow!("unknown net {name}"))?;
            let sinks = netlist
                .consumers(Source::Net(id))
                .into_iter()
                .map(|(gate, t)| format!("{}.{}", netlist.gate_name(gate), t.index() + 1))
                .collect();
            Ok((name.to_string(), sinks))
        })
        .collect::<Result<_>>()?;
    match format {
        OutputFormat::Json => {
            let nets: serde_json::Map<String, Value> = fan_out
                .into_iter()
                .map(|(name, sinks)| (name, json!(sinks)))
                .collect();
            let record = json!({
                "gates": netlist.gate_count(),
                "nets": nets,
                "depth": netlist.depth(),
                "hash": netlist.hash(),
            });
            println!("{record}");
        }
        OutputFormat::Text => {
            println!(
                "gates: {}  nets: {}  depth: {}",
                netlist.gate_count(),
                netlist.net_count(),
                netlist.depth()
            );
            println!("hash: blake3:{}", netlist.hash());
            for (name, sinks) in fan_out {
                println!("  {name:<6} -> {}", sinks.join(" "));
            }
        }
    }
    Ok(())
}

fn request(input: &Path) -> Result<()> {
    let text = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?
    };
    let parsed: Value = serde_json::from_str(&text).context("request is not valid JSON")?;
    let requests = match parsed {
        Value::Array(items) => items,
        single => vec![single],
    };
    info!(count = requests.len(), "evaluating requests");

    let results: Vec<Value> = requests
        .par_iter()
        .enumerate()
        .map(|(index, req)| match answer(req) {
            Ok(mut record) => {
                record["index"] = json!(index);
                record
            }
            Err(e) => json!({ "index": index, "error": e.to_string() }),
        })
        .collect();
    for record in results {
        println!("{record}");
    }
    Ok(())
}

fn answer(req: &Value) -> Result<Value, ic_netlist::IcError> {
    let chip = Ic7447::from_request(req)?;
    let pins = chip.process()?;
    let segments = Segments::from_pins(&pins)?;
    Ok(json!({
        "bcd": chip.bcd().code(),
        "pattern": segments.pattern(),
        "segments": segments,
        "pins": pins,
    }))
}
