//! Prelude module for common re-exports.
//!
//! ```rust
//! use atc_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::atc::config::AtcConfig;
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::atc::error::{AtcError, MachineError, ProbeFault};

// ─── Machine Types ──────────────────────────────────────────────────
pub use crate::atc::types::{
    AlarmKind, Axis, ControllerState, DigitalOutput, DistanceMode, Position, SpindleState,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_N_AXIS, TOOL_SETTER_INDEX};
