//! # ATC Simulator
//!
//! Runs tool changes against a simulated machine and prints a JSON summary
//! of the resulting tool table.
//!
//! # Usage
//!
//! ```bash
//! # Load tool 2, then swap to tool 4 with the spindle running
//! atc_sim --config config/atc.toml -t 2 -t 4 --spindle-on
//!
//! # Zero tool 1 on the workpiece, then change tools (TLO applied)
//! atc_sim --config config/atc.toml -t 1 --touch-off -t 3
//!
//! # Every motion command as G-code, JSON logs
//! atc_sim --config config/atc.toml -t 3 -v --json
//! ```

#![deny(warnings)]

mod scenario;

use atc_common::atc::types::SpindleState;
use atc_common::consts::DEFAULT_CONFIG_PATH;
use clap::Parser;
use scenario::{Scenario, SimFile, run_scenario};
use std::path::PathBuf;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// ATC Simulator - automatic tool changer on a virtual machine
#[derive(Parser, Debug)]
#[command(name = "atc_sim")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Runs automatic tool changes against a simulated machine")]
#[command(long_about = None)]
struct Args {
    /// Path to the tool-changer configuration (with optional [simulation] table)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Tool to change to (can be specified multiple times, run in order)
    #[arg(short, long = "tool", action = clap::ArgAction::Append)]
    tools: Vec<u8>,

    /// User macro to invoke after the tool changes (0 = clamp toggle)
    #[arg(long = "macro", action = clap::ArgAction::Append)]
    macros: Vec<u8>,

    /// Start with the spindle running clockwise
    #[arg(long)]
    spindle_on: bool,

    /// Start in incremental distance mode (G91)
    #[arg(long)]
    incremental: bool,

    /// Probe the workpiece after the first change, making that tool the length reference
    #[arg(long)]
    touch_off: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("ATC simulation failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Config level applies unless -v; a config that fails to load logs at INFO.
    let file = SimFile::from_file(&args.config);
    let level = match &file {
        _ if args.verbose => Level::DEBUG,
        Ok(file) => file.atc.shared.log_level.into(),
        Err(_) => Level::INFO,
    };
    setup_tracing(&args, level);

    info!("ATC simulator v{} starting...", env!("CARGO_PKG_VERSION"));
    let file = file.map_err(|e| format!("{}: {e}", args.config.display()))?;
    info!("Loaded {} ({})", args.config.display(), file.atc.shared.service_name);

    let scenario = Scenario {
        tools: args.tools.clone(),
        macros: args.macros.clone(),
        spindle: if args.spindle_on {
            SpindleState::Clockwise
        } else {
            SpindleState::Off
        },
        incremental: args.incremental,
        touch_off: args.touch_off,
    };

    let summary = run_scenario(&file, &scenario)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    match summary.error {
        Some(e) => Err(e.into()),
        None => {
            info!("ATC simulation complete");
            Ok(())
        }
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
