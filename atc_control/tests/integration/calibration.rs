//! Integration test: tool-setter calibration and length offsets.

use super::*;
use atc_common::atc::types::Axis;
use atc_control::machine::ModalQuery;
use atc_control::sequencer::ChangeOutcome;

fn load(atc: &mut ToolChanger<SimMachine>, tool: u8, contact_z: f64) -> ChangeOutcome {
    atc.machine_mut().queue_probe_contact(Some(contact_z));
    atc.request_tool_change(tool, ChangeMode::Automatic).unwrap()
}

#[test]
fn no_reference_leaves_offset_unchanged() {
    let mut atc = changer();
    let outcome = load(&mut atc, 1, -40.0);
    assert!(matches!(outcome, ChangeOutcome::Loaded(r) if r.tool_length_offset.is_none()));
    assert_eq!(atc.machine().tool_length_offset(), 0.0);
    assert_eq!(atc.state().zeroed_tool(), None);
}

#[test]
fn workpiece_probe_sets_reference_and_deltas_follow() {
    let mut atc = changer();
    load(&mut atc, 1, -40.0);
    assert!(touch_off(&mut atc));
    assert_eq!(atc.state().zeroed_tool(), Some(1));

    // Shorter tool triggers higher: positive delta.
    let outcome = load(&mut atc, 2, -37.0);
    assert!(matches!(outcome, ChangeOutcome::Loaded(r) if r.tool_length_offset == Some(3.0)));
    assert_eq!(atc.machine().tool_length_offset(), 3.0);

    // Back to the reference tool: delta is zero again.
    let outcome = load(&mut atc, 1, -40.0);
    assert!(matches!(outcome, ChangeOutcome::Loaded(r) if r.tool_length_offset == Some(0.0)));
    assert_eq!(atc.machine().tool_length_offset(), 0.0);
}

#[test]
fn delta_uses_latest_probe_of_both_tools() {
    let mut atc = changer();
    load(&mut atc, 4, -42.0);
    touch_off(&mut atc);
    load(&mut atc, 5, -44.5);

    let expected =
        atc.table().offset_of(5, Axis::Z) - atc.table().offset_of(4, Axis::Z);
    assert_eq!(expected, -2.5);
    assert_eq!(atc.machine().tool_length_offset(), expected);
}

#[test]
fn probe_target_tracks_work_offset() {
    let mut atc = changer();
    atc.machine_mut().set_work_offset(Axis::Z, -12.0);
    load(&mut atc, 3, -30.0);

    let probe = atc
        .machine()
        .commands()
        .into_iter()
        .find(|c| matches!(c.motion, Motion::ProbeToward { .. }))
        .unwrap();
    // Setter at machine Z -55 is work Z -43 under a -12 work offset.
    assert_eq!(probe.to_string(), "G38.2 F150 Z-43.000");
}

#[test]
fn unloaded_reference_probe_clears_reference() {
    let mut atc = changer();
    load(&mut atc, 2, -40.0);
    touch_off(&mut atc);
    atc.request_tool_change(0, ChangeMode::Automatic).unwrap();

    assert!(touch_off(&mut atc));
    assert_eq!(atc.state().zeroed_tool(), None);

    let outcome = load(&mut atc, 3, -38.0);
    assert!(matches!(outcome, ChangeOutcome::Loaded(r) if r.tool_length_offset.is_none()));
}

#[test]
fn setter_probe_notification_keeps_reference() {
    let mut atc = changer();
    load(&mut atc, 1, -40.0);
    // The setter probe of the change is reported after the change returns.
    assert!(!atc.notify_probe_completed());
    assert_eq!(atc.state().zeroed_tool(), None);

    assert!(touch_off(&mut atc));
    load(&mut atc, 2, -37.0);
    assert!(!atc.notify_probe_completed());
    assert_eq!(atc.state().zeroed_tool(), Some(1));

    // Later changes keep measuring against tool 1.
    let outcome = load(&mut atc, 3, -39.0);
    assert!(matches!(outcome, ChangeOutcome::Loaded(r) if r.tool_length_offset == Some(1.0)));
}

#[test]
fn repeated_notification_is_handled_once() {
    let mut atc = changer();
    load(&mut atc, 2, -40.0);
    assert!(touch_off(&mut atc));

    atc.request_tool_change(4, ChangeMode::Manual).unwrap();
    assert!(!atc.notify_probe_completed());
    assert_eq!(atc.state().zeroed_tool(), Some(2));
}

#[test]
fn only_loaded_tools_are_calibrated() {
    let mut atc = changer();
    load(&mut atc, 2, -41.0);
    load(&mut atc, 5, -39.0);

    let calibrated: Vec<u8> = atc
        .table()
        .iter()
        .filter(|(_, slot)| slot.calibrated)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(calibrated, vec![2, 5]);
}
