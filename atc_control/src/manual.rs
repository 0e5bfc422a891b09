//! Manual clamp toggle (macro 0).
//!
//! Lets the operator open or close the clamp by hand to swap a tool. Allowed
//! only while the controller is idle; the spindle interlock still applies.

use crate::clamp::ClampGate;
use crate::machine::Machine;
use atc_common::atc::error::AtcError;
use atc_common::atc::types::ControllerState;
use tracing::warn;

/// Invert the clamp actuator. Returns the new state (`true` = open).
///
/// # Errors
///
/// - `AtcError::NotIdle` unless the controller is idle
/// - `AtcError::SpindleSafetyViolation` if the spindle is enabled
pub fn toggle_clamp<M: Machine>(machine: &mut M, gate: &ClampGate) -> Result<bool, AtcError> {
    let state = machine.controller_state();
    if state != ControllerState::Idle {
        warn!("ATC manual change only permitted in idle (controller {:?})", state);
        return Err(AtcError::NotIdle(state));
    }

    let open = !gate.is_open(machine);
    gate.set_open(machine, open)?;
    Ok(open)
}
