//! Tool-setter probe cycle.
//!
//! Measures the tool in the spindle against the fixed tool setter, records
//! the probed machine Z for the current tool, and, when a reference tool has
//! been zeroed on the workpiece, applies the length difference as the active
//! tool-length offset.
//!
//! ## Sequence
//!
//! 1. Rapid above the setter at safe travel height, then down to approach height
//! 2. Optional air blast over the sensor
//! 3. Probe toward the setter, target expressed in the live work frame
//! 4. Alarm → fail without touching the table
//! 5. Record probed Z, apply `offset[current] − offset[reference]`
//! 6. Back to safe travel height

use crate::command::{AxisTarget, MotionCommand};
use crate::machine::{Machine, run};
use crate::state::ToolChangerState;
use crate::tool_table::ToolTable;
use atc_common::atc::config::AtcConfig;
use atc_common::atc::error::{AtcError, ProbeFault};
use atc_common::atc::types::{Axis, DigitalOutput};
use std::time::Duration;
use tracing::{info, warn};

/// Result of a successful calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReport {
    /// Tool that was measured.
    pub tool: u8,
    /// Probed machine Z, now stored as the tool's calibrated offset.
    pub probed_z: f64,
    /// Length offset applied; `None` when no reference tool is zeroed.
    pub tool_length_offset: Option<f64>,
}

/// Tool-setter probe parameters.
#[derive(Debug, Clone)]
pub struct ProbeCycle {
    feed_rate: f64,
    /// Height above the setter trigger point where probing starts.
    approach_height: f64,
    dust_off: Option<Duration>,
}

impl ProbeCycle {
    pub fn new(feed_rate: f64, approach_height: f64, dust_off: Option<Duration>) -> Self {
        Self {
            feed_rate,
            approach_height,
            dust_off,
        }
    }

    pub fn from_config(config: &AtcConfig) -> Self {
        Self::new(
            config.tool_setter.probe_feed_rate,
            config.offsets.release.z(),
            config.dust_off(),
        )
    }

    /// Calibrate the tool currently in the spindle.
    ///
    /// # Errors
    ///
    /// - `AtcError::ProbeFailed` if the controller alarms during the probing
    ///   move; the tool table is left unmodified
    /// - `AtcError::Alarm` if an alarm appears during the air blast
    pub fn probe_current_tool<M: Machine>(
        &self,
        machine: &mut M,
        table: &mut ToolTable,
        state: &mut ToolChangerState,
    ) -> Result<ProbeReport, AtcError> {
        let setter = table.tool_setter();
        let tool = state.current_tool();

        info!("Move over tool setter");
        run(
            machine,
            MotionCommand::rapid(AxisTarget::xyz(setter.x(), setter.y(), state.top_of_z())),
        )?;
        run(
            machine,
            MotionCommand::rapid(AxisTarget::z(setter.z() + self.approach_height)),
        )?;

        self.dust_off(machine)?;

        let wco = machine.work_offset(Axis::Z) + machine.tool_length_offset();
        let probe_to = setter.z() - wco;
        info!("ATC probing to Z{:.3}", probe_to);

        state.begin_setter_probe();
        let probed = run(
            machine,
            MotionCommand::probe_toward(probe_to, self.feed_rate).synced(),
        );
        state.end_setter_probe(probed.is_ok().then(|| machine.probe_sequence()));
        probed?;

        if let Some(alarm) = machine.alarm() {
            let fault = ProbeFault::from_alarm(alarm);
            match fault {
                ProbeFault::SwitchError => warn!("ATC probe switch error"),
                ProbeFault::MissingTool => warn!("ATC missing tool?"),
            }
            return Err(AtcError::ProbeFailed(fault));
        }

        let probed_z = machine.probe_position().z();
        table.record_offset(tool, Axis::Z, probed_z);

        let tool_length_offset = match state.zeroed_tool() {
            Some(reference) => {
                if !table.calibrated(reference) {
                    warn!(
                        "Reference tool {} was never measured on the tool setter",
                        reference
                    );
                }
                let tlo = probed_z - table.offset_of(reference, Axis::Z);
                info!("ATC tool {} TLO {:.3} (reference tool {})", tool, tlo, reference);
                run(machine, MotionCommand::apply_tool_length_offset(tlo))?;
                Some(tlo)
            }
            None => {
                warn!(
                    "ATC tool {} probed at Z{:.3}, no reference tool zeroed: TLO unchanged",
                    tool, probed_z
                );
                None
            }
        };

        run(machine, MotionCommand::rapid(AxisTarget::z(state.top_of_z())))?;

        Ok(ProbeReport {
            tool,
            probed_z,
            tool_length_offset,
        })
    }

    /// Squirt of air over the setter to clear chips.
    fn dust_off<M: Machine>(&self, machine: &mut M) -> Result<(), AtcError> {
        let Some(duration) = self.dust_off else {
            return Ok(());
        };

        machine.set_output(DigitalOutput::DustOff, true);
        let blast = run(machine, MotionCommand::dwell(duration).synced());
        machine.set_output(DigitalOutput::DustOff, false);
        blast?;

        match machine.alarm() {
            Some(alarm) => Err(AtcError::Alarm(alarm)),
            None => Ok(()),
        }
    }
}
