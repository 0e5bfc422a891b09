//! Shared fixtures for the integration tests.

mod calibration;
mod properties;
mod tool_change;

use atc_common::atc::config::AtcConfig;
use atc_common::atc::types::DigitalOutput;
use atc_common::config::ConfigLoader;
use atc_control::command::{Motion, MotionCommand};
use atc_control::machine::MotionExecutor;
use atc_control::sequencer::{ChangeMode, ToolChanger};
use atc_control::sim::{SimConfig, SimEventKind, SimMachine};
use std::time::Duration;

/// 5-slot rack, pockets 35 mm apart, tool setter at the right end.
pub const RACK: &str = r#"
[shared]
service_name = "atc-test"

[rack]
slot_count = 5
base = [-160.0, -0.5, -45.0]
pitch = [35.0, 0.0, 0.0]

[tool_setter]
position = [-7.0, -52.0, -55.0]

[timing]
grab_settle_s = 1.0
spindown_s = 2.0
spinup_s = 3.0
"#;

pub fn config() -> AtcConfig {
    AtcConfig::parse(RACK).unwrap()
}

pub fn changer_with(config: &AtcConfig, sim: SimMachine) -> ToolChanger<SimMachine> {
    ToolChanger::new(config, sim).unwrap()
}

pub fn changer() -> ToolChanger<SimMachine> {
    changer_with(&config(), SimMachine::new(SimConfig::default()))
}

/// Tool changer that believes `tool` is in the spindle, with a clean log.
pub fn holding(tool: u8) -> ToolChanger<SimMachine> {
    let mut atc = changer();
    atc.request_tool_change(tool, ChangeMode::Manual).unwrap();
    atc.machine_mut().clear_events();
    atc
}

/// Probe the workpiece with whatever is in the spindle, then report the
/// probe through the notification hook as the probing subsystem does.
pub fn touch_off(atc: &mut ToolChanger<SimMachine>) -> bool {
    atc.machine_mut().queue_probe_contact(Some(-60.0));
    atc.machine_mut()
        .execute(&MotionCommand::probe_toward(-200.0, 100.0).synced())
        .unwrap();
    atc.notify_probe_completed()
}

/// Time of the first command matching `pred`.
pub fn command_time(sim: &SimMachine, pred: impl Fn(&MotionCommand) -> bool) -> Option<Duration> {
    sim.events().iter().find_map(|e| match e.kind {
        SimEventKind::Command(c) if pred(&c) => Some(e.at),
        _ => None,
    })
}

/// Time of the first write of `on` to `output`.
pub fn output_time(sim: &SimMachine, output: DigitalOutput, on: bool) -> Option<Duration> {
    sim.events().iter().find_map(|e| match e.kind {
        SimEventKind::Output { output: o, on: v } if o == output && v == on => Some(e.at),
        _ => None,
    })
}

pub fn probe_count(sim: &SimMachine) -> usize {
    sim.commands()
        .iter()
        .filter(|c| matches!(c.motion, Motion::ProbeToward { .. }))
        .count()
}
