//! Integration test: complete tool-change sequences.

use super::*;
use atc_common::atc::error::AtcError;
use atc_common::atc::types::{Axis, DistanceMode, Position, SpindleState};
use atc_control::machine::{DigitalOutputs, ModalQuery};
use atc_control::sequencer::{ChangeOutcome, ChangePhase};

// ── Bookkeeping ─────────────────────────────────────────────────────

#[test]
fn slot_three_position() {
    let atc = changer();
    assert_eq!(atc.table().position_of(3), Position::xyz(-90.0, -0.5, -45.0));
}

#[test]
fn same_tool_issues_no_motion() {
    let mut atc = holding(3);
    assert_eq!(
        atc.request_tool_change(3, ChangeMode::Automatic),
        Ok(ChangeOutcome::AlreadyLoaded(3))
    );
    assert!(atc.machine().events().is_empty());
}

#[test]
fn out_of_range_issues_no_motion() {
    let mut atc = holding(1);
    assert_eq!(
        atc.request_tool_change(6, ChangeMode::Automatic),
        Err(AtcError::OutOfRange {
            requested: 6,
            slot_count: 5
        })
    );
    assert!(atc.machine().events().is_empty());
    assert_eq!(atc.state().current_tool(), 1);
}

#[test]
fn out_of_range_message_is_readable() {
    let mut atc = changer();
    let err = atc
        .request_tool_change(9, ChangeMode::Automatic)
        .unwrap_err();
    assert_eq!(err.to_string(), "Tool 9 out of range (rack has 5 slots)");
}

// ── Load / return ───────────────────────────────────────────────────

#[test]
fn load_from_empty_grabs_and_probes() {
    let mut atc = changer();
    atc.machine_mut().queue_probe_contact(Some(-40.0));

    let outcome = atc.request_tool_change(2, ChangeMode::Automatic).unwrap();
    assert!(matches!(outcome, ChangeOutcome::Loaded(r) if r.tool == 2 && r.probed_z == -40.0));
    assert_eq!(atc.state().current_tool(), 2);
    assert_eq!(atc.table().offset_of(2, Axis::Z), -40.0);
    assert_eq!(atc.phase(), ChangePhase::Done);

    let sim = atc.machine();
    assert_eq!(probe_count(sim), 1);
    assert_eq!(sim.output_changes(DigitalOutput::ClampRelease), 2);
    assert!(!sim.read_output(DigitalOutput::ClampRelease));

    // Grab: open above the pocket, close at the pocket.
    let rendered: Vec<String> = sim.commands().iter().map(ToString::to_string).collect();
    assert!(rendered.contains(&"G53 G0 X-125.000 Y-0.500 Z-10.000".to_string()));
    assert!(rendered.contains(&"G53 G1 F300 X-125.000 Y-0.500 Z-45.000".to_string()));
    assert!(rendered.contains(&"G53 G1 F300 X-125.000 Y-25.500 Z-45.000".to_string()));
    assert!(rendered.contains(&"G4 P1.000".to_string()));

    // Back over the saved X/Y at safe height.
    assert_eq!(sim.position(), Position::xyz(0.0, 0.0, -1.0));
}

#[test]
fn swap_returns_held_tool_first() {
    let mut atc = holding(1);
    atc.request_tool_change(3, ChangeMode::Automatic).unwrap();

    let sim = atc.machine();
    let rendered: Vec<String> = sim.commands().iter().map(ToString::to_string).collect();
    let into_clip = rendered
        .iter()
        .position(|c| c == "G53 G1 F300 X-160.000 Y-0.500")
        .unwrap();
    let grab = rendered
        .iter()
        .position(|c| c == "G53 G1 F300 X-90.000 Y-0.500 Z-45.000")
        .unwrap();
    assert!(into_clip < grab);

    // Two actuations to return, two to grab.
    assert_eq!(sim.output_changes(DigitalOutput::ClampRelease), 4);
    assert_eq!(atc.state().current_tool(), 3);
}

#[test]
fn unload_to_zero_parks_over_setter_without_probe() {
    let mut atc = holding(2);
    assert_eq!(
        atc.request_tool_change(0, ChangeMode::Automatic),
        Ok(ChangeOutcome::Unloaded)
    );

    let sim = atc.machine();
    assert_eq!(probe_count(sim), 0);
    assert_eq!(sim.position(), Position::xyz(-7.0, -52.0, -1.0));
    assert_eq!(sim.output_changes(DigitalOutput::ClampRelease), 2);
    assert!(!sim.read_output(DigitalOutput::ClampRelease));
    assert!(atc.state().is_empty());
}

#[test]
fn round_trip_keeps_offset_until_reprobed() {
    let mut atc = changer();
    atc.machine_mut().queue_probe_contact(Some(-40.0));
    atc.request_tool_change(1, ChangeMode::Automatic).unwrap();
    assert_eq!(atc.table().offset_of(1, Axis::Z), -40.0);

    atc.machine_mut().queue_probe_contact(Some(-35.0));
    atc.request_tool_change(3, ChangeMode::Automatic).unwrap();
    assert_eq!(atc.table().offset_of(1, Axis::Z), -40.0);
    assert_eq!(atc.table().offset_of(3, Axis::Z), -35.0);

    // Loading tool 1 again measures it again.
    atc.machine_mut().queue_probe_contact(Some(-40.25));
    atc.request_tool_change(1, ChangeMode::Automatic).unwrap();
    assert_eq!(atc.table().offset_of(1, Axis::Z), -40.25);
    assert_eq!(atc.table().offset_of(3, Axis::Z), -35.0);
    assert_eq!(atc.state().current_tool(), 1);
}

// ── Modal state ─────────────────────────────────────────────────────

#[test]
fn incremental_mode_is_restored_after_return() {
    let mut atc = changer();
    atc.machine_mut().set_distance_mode(DistanceMode::Incremental);
    atc.request_tool_change(4, ChangeMode::Automatic).unwrap();

    let sim = atc.machine();
    let rendered: Vec<String> = sim.commands().iter().map(ToString::to_string).collect();
    assert_eq!(rendered.first().map(String::as_str), Some("G90"));
    assert_eq!(rendered.last().map(String::as_str), Some("G91"));
    assert_eq!(sim.distance_mode(), DistanceMode::Incremental);
}

#[test]
fn incremental_mode_is_restored_after_unload() {
    let mut atc = holding(4);
    atc.machine_mut().set_distance_mode(DistanceMode::Incremental);
    atc.request_tool_change(0, ChangeMode::Automatic).unwrap();
    assert_eq!(atc.machine().distance_mode(), DistanceMode::Incremental);
}

#[test]
fn absolute_mode_is_left_alone() {
    let mut atc = changer();
    atc.request_tool_change(4, ChangeMode::Automatic).unwrap();
    let issued_mode_change = atc
        .machine()
        .commands()
        .iter()
        .any(|c| matches!(c.motion, Motion::DistanceMode(_)));
    assert!(!issued_mode_change);
}

#[test]
fn spindle_direction_is_restored() {
    let mut atc = holding(1);
    atc.machine_mut().set_spindle(SpindleState::CounterClockwise);
    atc.request_tool_change(2, ChangeMode::Automatic).unwrap();

    let sim = atc.machine();
    assert_eq!(sim.spindle_state(), SpindleState::CounterClockwise);
    let rendered: Vec<String> = sim.commands().iter().map(ToString::to_string).collect();
    assert!(rendered.contains(&"M5".to_string()));
    assert!(rendered.contains(&"M4".to_string()));
}

#[test]
fn spindle_left_off_when_it_was_off() {
    let mut atc = holding(1);
    atc.request_tool_change(2, ChangeMode::Automatic).unwrap();
    let toggled_spindle = atc
        .machine()
        .commands()
        .iter()
        .any(|c| matches!(c.motion, Motion::Spindle(_)));
    assert!(!toggled_spindle);
    assert_eq!(atc.machine().spindle_state(), SpindleState::Off);
}

// ── Timing ──────────────────────────────────────────────────────────

#[test]
fn clamp_waits_for_spindown() {
    let mut atc = holding(1);
    atc.machine_mut().set_spindle(SpindleState::Clockwise);
    atc.request_tool_change(3, ChangeMode::Automatic).unwrap();

    let sim = atc.machine();
    let m5 = command_time(sim, |c| *c == MotionCommand::spindle(SpindleState::Off)).unwrap();
    let open = output_time(sim, DigitalOutput::ClampRelease, true).unwrap();
    assert!(open - m5 >= Duration::from_secs(2));
}

#[test]
fn spindown_overlaps_travel() {
    // Start right in front of pocket 1 with a fast rack feed, so the
    // travel to the clip is shorter than the spin-down time.
    let mut config = config();
    config.motion.rack_feed_rate = 6000.0;
    let mut sim = SimMachine::new(SimConfig {
        start_position: Position::xyz(-160.0, -25.5, -45.0),
        ..Default::default()
    });
    sim.set_spindle(SpindleState::Clockwise);
    let mut atc = changer_with(&config, sim);
    atc.request_tool_change(1, ChangeMode::Manual).unwrap();
    atc.machine_mut().clear_events();

    atc.request_tool_change(2, ChangeMode::Automatic).unwrap();

    let sim = atc.machine();
    let m5 = command_time(sim, |c| *c == MotionCommand::spindle(SpindleState::Off)).unwrap();
    let open = output_time(sim, DigitalOutput::ClampRelease, true).unwrap();
    assert_eq!(open - m5, Duration::from_secs(2));

    let slept: Duration = sim
        .events()
        .iter()
        .filter_map(|e| match e.kind {
            SimEventKind::Sleep(d) if e.at < open => Some(d),
            _ => None,
        })
        .sum();
    assert!(slept > Duration::ZERO);
    assert!(slept < Duration::from_secs(2));
}

#[test]
fn hands_back_only_after_spinup() {
    let mut atc = holding(1);
    atc.machine_mut().set_spindle(SpindleState::Clockwise);
    atc.request_tool_change(2, ChangeMode::Automatic).unwrap();

    let sim = atc.machine();
    let m3 = command_time(sim, |c| *c == MotionCommand::spindle(SpindleState::Clockwise)).unwrap();
    assert!(sim.clock() >= m3 + Duration::from_secs(3));
    assert_eq!(sim.spindle(), SpindleState::Clockwise);
}
