//! Error taxonomy for tool-change operations.
//!
//! Every failure is detected inside the phase that caused it and ends the
//! sequence at once; there is no retry anywhere. The `Display` text of each
//! variant is the diagnostic reported back to the dispatcher.

use super::types::{AlarmKind, ControllerState};
use thiserror::Error;

/// Failure reported by the external motion layer when it refuses a command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MachineError {
    /// The command was rejected (modal conflict, queue closed, ...).
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// Communication with the motion layer failed.
    #[error("Motion layer unavailable: {0}")]
    Unavailable(String),
}

/// Why a tool-setter probe cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProbeFault {
    /// Probe was already triggered when the cycle started.
    #[error("probe switch error")]
    SwitchError,

    /// Probe never triggered over the full travel: no tool in the spindle?
    #[error("missing tool?")]
    MissingTool,
}

impl ProbeFault {
    /// Classify the alarm latched by a failed probing move.
    pub const fn from_alarm(alarm: AlarmKind) -> Self {
        match alarm {
            AlarmKind::ProbeFailInitial => Self::SwitchError,
            _ => Self::MissingTool,
        }
    }
}

/// Errors returned by the tool changer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AtcError {
    /// Requested slot is beyond the configured rack; rejected before any side effect.
    #[error("Tool {requested} out of range (rack has {slot_count} slots)")]
    OutOfRange {
        /// Requested slot index.
        requested: u8,
        /// Configured number of rack slots.
        slot_count: u8,
    },

    /// Clamp actuation attempted while the spindle is powered.
    #[error("Spindle on during tool change: clamp actuation refused")]
    SpindleSafetyViolation,

    /// Alarm during tool-setter calibration.
    #[error("Tool setter probe failed: {0}")]
    ProbeFailed(ProbeFault),

    /// Manual clamp toggle attempted while the controller is not idle.
    #[error("Manual clamp toggle only permitted in idle (controller is {0:?})")]
    NotIdle(ControllerState),

    /// Controller alarm observed after a blocking phase.
    #[error("Controller alarm during tool change: {0:?}")]
    Alarm(AlarmKind),

    /// Macro number with no routine attached.
    #[error("Undefined macro number: {0}")]
    UndefinedMacro(u8),

    /// The motion layer refused a command.
    #[error(transparent)]
    Machine(#[from] MachineError),
}
