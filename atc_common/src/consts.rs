//! System-wide constants for the ATC workspace.
//!
//! Single source of truth for numeric limits, rack indices and default paths.

use static_assertions::const_assert;

/// Maximum number of axes a coordinate may carry (X Y Z A B C).
pub const MAX_N_AXIS: usize = 6;

/// Minimum number of axes a coordinate must carry (X Y Z).
pub const MIN_N_AXIS: usize = 3;

const_assert!(MIN_N_AXIS <= MAX_N_AXIS);

/// Slot index reserved for the fixed electronic tool setter.
///
/// Also the value of `current_tool` when the spindle is empty.
pub const TOOL_SETTER_INDEX: u8 = 0;

/// Default feed rate for moves inside the rack [mm/min].
pub const DEFAULT_RACK_FEED_RATE: f64 = 300.0;

/// Default feed rate for the tool-setter probe [mm/min].
pub const DEFAULT_PROBE_FEED_RATE: f64 = 150.0;

/// Default settle time between clamp close and withdrawal [s].
pub const DEFAULT_GRAB_SETTLE_S: f64 = 1.0;

/// Default spindle spin-down / spin-up delay [s].
pub const DEFAULT_SPINDLE_DELAY_S: f64 = 2.0;

/// Upper bound for any configured delay [s].
pub const MAX_DELAY_S: f64 = 3600.0;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/atc/atc.toml";
