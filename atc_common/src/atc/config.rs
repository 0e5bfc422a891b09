//! Tool-changer configuration.
//!
//! Rack geometry, tool-setter location, grab/release/load travel offsets and
//! timing. Loaded once at startup and never mutated at runtime.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "atc"
//!
//! [rack]
//! slot_count = 5
//! base = [-160.0, -0.5, -45.0]
//! pitch = [35.0, 0.0, 0.0]
//!
//! [tool_setter]
//! position = [-7.0, -52.0, -55.0]
//!
//! [offsets]
//! load = [0.0, -25.0, 0.0]
//! release = [0.0, 0.0, 35.0]
//!
//! [timing]
//! spindown_s = 2.0
//! spinup_s = 3.0
//! ```

use super::types::Position;
use crate::config::{ConfigError, ConfigLoader, SharedConfig};
use crate::consts::{
    DEFAULT_GRAB_SETTLE_S, DEFAULT_PROBE_FEED_RATE, DEFAULT_RACK_FEED_RATE,
    DEFAULT_SPINDLE_DELAY_S, MAX_DELAY_S,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Linear tool rack geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RackConfig {
    /// Number of physical tool slots (slot 0 is the tool setter, not counted).
    pub slot_count: u8,
    /// Machine position of slot 1.
    pub base: Position,
    /// Per-slot increment.
    pub pitch: Position,
}

/// Fixed electronic tool setter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSetterConfig {
    /// Machine position at which the collet face triggers the probe.
    pub position: Position,
    /// Probe feed rate [mm/min].
    #[serde(default = "default_probe_feed_rate")]
    pub probe_feed_rate: f64,
    /// Air-blast duration [s]; absent = no air blast fitted.
    #[serde(default)]
    pub dust_off_s: Option<f64>,
}

/// Travel offsets relative to a slot's pickup position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OffsetsConfig {
    /// Offset to move out of (or in front of) the tool clip.
    #[serde(default = "default_load_offset")]
    pub load: Position,
    /// Offset above the pocket where the clamp is actuated.
    #[serde(default = "default_release_offset")]
    pub release: Position,
}

impl Default for OffsetsConfig {
    fn default() -> Self {
        Self {
            load: default_load_offset(),
            release: default_release_offset(),
        }
    }
}

/// Timing parameters [s].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Settle time between clamp close and withdrawal.
    #[serde(default = "default_grab_settle")]
    pub grab_settle_s: f64,
    /// Spindle deceleration time.
    #[serde(default = "default_spindle_delay")]
    pub spindown_s: f64,
    /// Spindle acceleration time.
    #[serde(default = "default_spindle_delay")]
    pub spinup_s: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            grab_settle_s: DEFAULT_GRAB_SETTLE_S,
            spindown_s: DEFAULT_SPINDLE_DELAY_S,
            spinup_s: DEFAULT_SPINDLE_DELAY_S,
        }
    }
}

impl TimingConfig {
    pub fn grab_settle(&self) -> Duration {
        Duration::from_secs_f64(self.grab_settle_s)
    }

    pub fn spindown(&self) -> Duration {
        Duration::from_secs_f64(self.spindown_s)
    }

    pub fn spinup(&self) -> Duration {
        Duration::from_secs_f64(self.spinup_s)
    }
}

/// Feed rates used inside the rack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    /// Feed rate for moves into, out of and inside a tool clip [mm/min].
    #[serde(default = "default_rack_feed_rate")]
    pub rack_feed_rate: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            rack_feed_rate: DEFAULT_RACK_FEED_RATE,
        }
    }
}

/// Complete tool-changer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtcConfig {
    pub shared: SharedConfig,
    pub rack: RackConfig,
    pub tool_setter: ToolSetterConfig,
    #[serde(default)]
    pub offsets: OffsetsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub motion: MotionConfig,
}

fn default_probe_feed_rate() -> f64 {
    DEFAULT_PROBE_FEED_RATE
}
fn default_rack_feed_rate() -> f64 {
    DEFAULT_RACK_FEED_RATE
}
fn default_grab_settle() -> f64 {
    DEFAULT_GRAB_SETTLE_S
}
fn default_spindle_delay() -> f64 {
    DEFAULT_SPINDLE_DELAY_S
}
fn default_load_offset() -> Position {
    Position::xyz(0.0, -25.0, 0.0)
}
fn default_release_offset() -> Position {
    Position::xyz(0.0, 0.0, 35.0)
}

impl AtcConfig {
    /// Load from a TOML file and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `slot_count` is zero
    /// - coordinates disagree on axis count
    /// - a feed rate is not strictly positive
    /// - a duration is negative or not finite
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.rack.slot_count == 0 {
            return Err(invalid("rack.slot_count must be greater than zero"));
        }

        let axes = self.rack.base.len();
        let coords = [
            ("rack.pitch", &self.rack.pitch),
            ("tool_setter.position", &self.tool_setter.position),
            ("offsets.load", &self.offsets.load),
            ("offsets.release", &self.offsets.release),
        ];
        for (name, p) in coords {
            if p.len() != axes {
                return Err(invalid(&format!(
                    "{name} has {} axes, rack.base has {axes}",
                    p.len()
                )));
            }
        }

        check_rate("tool_setter.probe_feed_rate", self.tool_setter.probe_feed_rate)?;
        check_rate("motion.rack_feed_rate", self.motion.rack_feed_rate)?;

        check_duration("timing.grab_settle_s", self.timing.grab_settle_s)?;
        check_duration("timing.spindown_s", self.timing.spindown_s)?;
        check_duration("timing.spinup_s", self.timing.spinup_s)?;
        if let Some(d) = self.tool_setter.dust_off_s {
            check_duration("tool_setter.dust_off_s", d)?;
        }

        Ok(())
    }

    /// Air-blast duration, if an air blast is fitted.
    pub fn dust_off(&self) -> Option<Duration> {
        self.tool_setter.dust_off_s.map(Duration::from_secs_f64)
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

fn check_rate(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(&format!("{name} must be > 0 (got {value})")))
    }
}

/// Delays become `Duration`s at startup: NaN, negative and oversized values
/// must fail here, not in the conversion.
fn check_duration(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=MAX_DELAY_S).contains(&value) {
        Ok(())
    } else {
        Err(invalid(&format!(
            "{name} must be within 0..={MAX_DELAY_S} s (got {value})"
        )))
    }
}
