//! Machine interface consumed by the tool changer.
//!
//! The motion executor, modal-state model, probing subsystem, digital I/O and
//! time source all belong to the surrounding motion-control platform. The
//! tool changer reaches them only through the narrow traits below, which the
//! platform (or [`crate::sim::SimMachine`]) implements.
//!
//! # Suspension points
//!
//! The sequencer blocks in exactly two places:
//! - a synced [`MotionExecutor::execute`] / [`MotionExecutor::synchronize`]
//!   barrier, which returns once the motion queue has drained
//! - [`Clock::sleep`], used to wait out spindle deadlines

use crate::command::MotionCommand;
use atc_common::atc::error::MachineError;
use atc_common::atc::types::{
    AlarmKind, Axis, ControllerState, DigitalOutput, DistanceMode, Position, SpindleState,
};
use std::time::Duration;
use tracing::debug;

/// Motion command queue.
pub trait MotionExecutor {
    /// Queue a command. When `command.sync` is set, return only after the
    /// queue has fully drained that command.
    fn execute(&mut self, command: &MotionCommand) -> Result<(), MachineError>;

    /// Wait for all previously queued motion to finish.
    fn synchronize(&mut self) -> Result<(), MachineError>;
}

/// Read access to the G-code modal state and machine geometry.
pub trait ModalQuery {
    fn spindle(&self) -> SpindleState;

    fn distance_mode(&self) -> DistanceMode;

    /// Active work-coordinate offset on `axis` (coordinate system plus any
    /// G92-style offset), in machine units.
    fn work_offset(&self, axis: Axis) -> f64;

    /// Active tool-length offset (Z).
    fn tool_length_offset(&self) -> f64;

    /// Current machine position. Only meaningful after a barrier.
    fn machine_position(&self) -> Position;

    /// Upper travel limit of `axis` in machine coordinates.
    fn max_travel(&self, axis: Axis) -> f64;

    /// Distance the axis backs off the switch after homing.
    fn homing_pulloff(&self) -> f64;
}

/// Probe results and controller alarm state.
pub trait ProbeQuery {
    /// Machine position latched by the last probing move.
    fn probe_position(&self) -> Position;

    /// Number of probing moves run since boot, triggered or not.
    ///
    /// Identifies the probe a completion notification refers to.
    fn probe_sequence(&self) -> u64;

    fn controller_state(&self) -> ControllerState;

    /// Latched alarm, if the controller is in alarm.
    fn alarm(&self) -> Option<AlarmKind>;
}

/// Binary outputs (clamp release, air blast).
pub trait DigitalOutputs {
    fn set_output(&mut self, output: DigitalOutput, on: bool);

    fn read_output(&self, output: DigitalOutput) -> bool;
}

/// Monotonic time source.
pub trait Clock {
    /// Time since controller boot.
    fn now(&self) -> Duration;

    /// Suspend the calling sequence for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Everything the tool changer needs from the platform.
pub trait Machine: MotionExecutor + ModalQuery + ProbeQuery + DigitalOutputs + Clock {}

impl<T> Machine for T where T: MotionExecutor + ModalQuery + ProbeQuery + DigitalOutputs + Clock {}

/// Execute one command, logging it as G-code.
pub(crate) fn run<M: Machine>(machine: &mut M, command: MotionCommand) -> Result<(), MachineError> {
    debug!(sync = command.sync, "{}", command);
    machine.execute(&command)
}
