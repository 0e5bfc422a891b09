//! Simulation file, scenario runner and JSON summary.

use atc_common::prelude::*;
use atc_control::command::MotionCommand;
use atc_control::machine::{ModalQuery, MotionExecutor};
use atc_control::sequencer::{ChangeMode, ChangePhase, ToolChanger};
use atc_control::sim::{SimConfig, SimMachine};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Depth below the current position the touch-off probe may travel.
const TOUCH_OFF_TRAVEL: f64 = 100.0;

/// Tool-changer configuration plus the simulated machine's parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SimFile {
    #[serde(flatten)]
    pub atc: AtcConfig,
    #[serde(default)]
    pub simulation: SimConfig,
}

impl SimFile {
    /// Load and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = Self::load(path)?;
        file.atc.validate()?;
        Ok(file)
    }
}

/// What to run, in order: tool changes first, then macros.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub tools: Vec<u8>,
    pub macros: Vec<u8>,
    /// Spindle state before the first change.
    pub spindle: SpindleState,
    /// Start in incremental distance mode.
    pub incremental: bool,
    /// Workpiece probe after the first change: that tool becomes the reference.
    pub touch_off: bool,
}

#[derive(Debug, Serialize)]
pub struct SlotSummary {
    pub slot: u8,
    pub position: Position,
    pub probed_z: f64,
    pub calibrated: bool,
}

/// Final state after a scenario.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub current_tool: u8,
    pub zeroed_tool: Option<u8>,
    pub phase: ChangePhase,
    pub tool_length_offset: f64,
    pub elapsed_s: f64,
    pub commands: usize,
    pub slots: Vec<SlotSummary>,
    /// Diagnostic of the step that failed; the run stops there.
    pub error: Option<String>,
}

/// Run `scenario` on a fresh simulated machine.
///
/// Tool-change failures end the run and are reported in
/// [`Summary::error`]; only configuration problems are returned as `Err`.
pub fn run_scenario(file: &SimFile, scenario: &Scenario) -> Result<Summary, ConfigError> {
    let mut sim = SimMachine::new(file.simulation.clone());
    sim.set_spindle(scenario.spindle);
    if scenario.incremental {
        sim.set_distance_mode(DistanceMode::Incremental);
    }

    let mut atc = ToolChanger::new(&file.atc, sim)?;
    let mut failure = None;

    // Failures are reported once, through the summary.
    for (i, &tool) in scenario.tools.iter().enumerate() {
        match atc.request_tool_change(tool, ChangeMode::Automatic) {
            Ok(outcome) => info!("Tool {}: {:?}", tool, outcome),
            Err(e) => {
                failure = Some(e.to_string());
                break;
            }
        }
        if scenario.touch_off && i == 0 {
            touch_off(&mut atc, file.atc.tool_setter.probe_feed_rate);
        }
    }

    if failure.is_none() {
        for &id in &scenario.macros {
            if let Err(e) = atc.invoke_macro(id) {
                failure = Some(e.to_string());
                break;
            }
        }
    }

    Ok(summarize(&atc, failure))
}

/// Probe down onto the workpiece and report it through the notification hook.
fn touch_off(atc: &mut ToolChanger<SimMachine>, feed_rate: f64) {
    let sim = atc.machine_mut();
    let wco = sim.work_offset(Axis::Z) + sim.tool_length_offset();
    let to = sim.machine_position().z() - TOUCH_OFF_TRAVEL - wco;
    if let Err(e) = sim.execute(&MotionCommand::probe_toward(to, feed_rate).synced()) {
        warn!("Workpiece touch-off not run: {}", e);
        return;
    }
    if atc.notify_probe_completed() {
        info!("Workpiece touch-off with tool {}", atc.state().current_tool());
    }
}

fn summarize(atc: &ToolChanger<SimMachine>, error: Option<String>) -> Summary {
    let sim = atc.machine();
    Summary {
        current_tool: atc.state().current_tool(),
        zeroed_tool: atc.state().zeroed_tool(),
        phase: atc.phase(),
        tool_length_offset: sim.tool_length_offset(),
        elapsed_s: sim.clock().as_secs_f64(),
        commands: sim.commands().len(),
        slots: atc
            .table()
            .iter()
            .map(|(slot, entry)| SlotSummary {
                slot,
                position: entry.machine_position,
                probed_z: entry.calibrated_offset.z(),
                calibrated: entry.calibrated,
            })
            .collect(),
        error,
    }
}
