//! Property tests over tool numbers, spindle states and probe readings.

use super::*;
use atc_common::atc::error::AtcError;
use atc_common::atc::types::SpindleState;
use atc_control::clamp::ClampGate;
use atc_control::machine::DigitalOutputs;
use atc_control::sequencer::ChangeOutcome;
use atc_control::spindle::remaining_wait;
use proptest::prelude::*;

fn spindle_state() -> impl Strategy<Value = SpindleState> {
    prop_oneof![
        Just(SpindleState::Off),
        Just(SpindleState::Clockwise),
        Just(SpindleState::CounterClockwise),
    ]
}

proptest! {
    /// Requesting the tool already in the spindle is a no-op.
    #[test]
    fn same_tool_never_moves(tool in 0u8..=5) {
        let mut atc = holding(tool);
        let outcome = atc.request_tool_change(tool, ChangeMode::Automatic);
        prop_assert_eq!(outcome, Ok(ChangeOutcome::AlreadyLoaded(tool)));
        prop_assert!(atc.machine().events().is_empty());
    }

    /// Any tool past the rack is rejected before a side effect.
    #[test]
    fn out_of_range_never_moves(current in 0u8..=5, target in 6u8..=u8::MAX) {
        let mut atc = holding(current);
        let outcome = atc.request_tool_change(target, ChangeMode::Automatic);
        let rejected = matches!(outcome, Err(AtcError::OutOfRange { requested, slot_count: 5 }) if requested == target);
        prop_assert!(rejected);
        prop_assert!(atc.machine().events().is_empty());
        prop_assert_eq!(atc.state().current_tool(), current);
    }

    /// The clamp output never changes while the spindle is enabled.
    #[test]
    fn clamp_never_moves_with_spindle_on(
        steps in proptest::collection::vec((spindle_state(), any::<bool>()), 1..40)
    ) {
        let mut sim = SimMachine::default();
        let gate = ClampGate;

        for (spindle, open) in steps {
            sim.set_spindle(spindle);
            let before = sim.read_output(DigitalOutput::ClampRelease);
            let writes = sim.output_changes(DigitalOutput::ClampRelease);
            let result = gate.set_open(&mut sim, open);

            if spindle.is_enabled() {
                prop_assert_eq!(result, Err(AtcError::SpindleSafetyViolation));
                prop_assert_eq!(sim.read_output(DigitalOutput::ClampRelease), before);
                prop_assert_eq!(sim.output_changes(DigitalOutput::ClampRelease), writes);
            } else {
                prop_assert!(result.is_ok());
                prop_assert_eq!(sim.read_output(DigitalOutput::ClampRelease), open);
            }
        }
    }

    /// Spindle waits are `max(0, deadline - now)`.
    #[test]
    fn wait_is_never_negative(deadline_ms in 0u64..100_000, now_ms in 0u64..100_000) {
        let wait = remaining_wait(
            Duration::from_millis(deadline_ms),
            Duration::from_millis(now_ms),
        );
        prop_assert_eq!(wait, Duration::from_millis(deadline_ms.saturating_sub(now_ms)));
    }

    /// Applied length offset is `offset[current] - offset[reference]`.
    #[test]
    fn length_offset_is_delta_to_reference(
        reference in 1u8..=5,
        other in 1u8..=5,
        reference_z in -54.0f64..-21.0,
        other_z in -54.0f64..-21.0,
    ) {
        prop_assume!(reference != other);
        let mut atc = changer();

        atc.machine_mut().queue_probe_contact(Some(reference_z));
        atc.request_tool_change(reference, ChangeMode::Automatic).unwrap();
        prop_assert!(!atc.notify_probe_completed());
        prop_assert!(touch_off(&mut atc));

        atc.machine_mut().queue_probe_contact(Some(other_z));
        let outcome = atc.request_tool_change(other, ChangeMode::Automatic).unwrap();

        let ChangeOutcome::Loaded(report) = outcome else {
            return Err(TestCaseError::fail("expected a loaded tool"));
        };
        prop_assert_eq!(report.tool_length_offset, Some(other_z - reference_z));
        prop_assert_eq!(atc.state().current_tool(), other);
        prop_assert_eq!(atc.table().offset_of(other, atc_common::atc::types::Axis::Z), other_z);
    }
}
