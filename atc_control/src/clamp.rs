//! Clamp safety gate.
//!
//! The clamp release output may only change while the spindle reports
//! disabled. Actuating the clamp on a rotating spindle destroys the seal, so
//! a refused call leaves the output untouched. Timing is not handled here:
//! callers wait out any spin-down deadline first.

use crate::machine::Machine;
use atc_common::atc::error::AtcError;
use atc_common::atc::types::DigitalOutput;
use tracing::{info, warn};

/// Drives the clamp release actuator behind the spindle interlock.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClampGate;

impl ClampGate {
    /// Open (`true`) or close (`false`) the clamp.
    ///
    /// # Errors
    ///
    /// `AtcError::SpindleSafetyViolation` if the spindle is enabled.
    pub fn set_open<M: Machine>(&self, machine: &mut M, open: bool) -> Result<(), AtcError> {
        if machine.spindle().is_enabled() {
            warn!("ATC fail: spindle on during clamp actuation");
            return Err(AtcError::SpindleSafetyViolation);
        }

        machine.set_output(DigitalOutput::ClampRelease, open);
        if open {
            info!("ATC release");
        } else {
            info!("ATC close");
        }
        Ok(())
    }

    /// Current actuator state (`true` = open).
    pub fn is_open<M: Machine>(&self, machine: &M) -> bool {
        machine.read_output(DigitalOutput::ClampRelease)
    }
}
