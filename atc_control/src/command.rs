//! Typed motion commands.
//!
//! A [`MotionCommand`] is an explicit value (target, feed rate, sync flag)
//! handed to [`crate::machine::MotionExecutor`]. Its `Display` impl renders
//! the equivalent G-code line, which is what the log shows.
//!
//! ```rust
//! use atc_control::command::{AxisTarget, MotionCommand};
//!
//! let cmd = MotionCommand::feed(AxisTarget::xy(-90.0, -0.5), 300.0).synced();
//! assert_eq!(cmd.to_string(), "G53 G1 F300 X-90.000 Y-0.500");
//! assert!(cmd.sync);
//! ```

use atc_common::atc::types::{Axis, DistanceMode, Position, SpindleState};
use atc_common::consts::MAX_N_AXIS;
use std::fmt;
use std::time::Duration;

// ─── Axis Target ────────────────────────────────────────────────────

/// Partial machine-coordinate target: only the named axes move.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisTarget([Option<f64>; MAX_N_AXIS]);

impl AxisTarget {
    /// Target with no axis words.
    pub const fn new() -> Self {
        Self([None; MAX_N_AXIS])
    }

    /// Add (or replace) one axis word.
    pub const fn with(mut self, axis: Axis, value: f64) -> Self {
        self.0[axis as usize] = Some(value);
        self
    }

    pub const fn z(z: f64) -> Self {
        Self::new().with(Axis::Z, z)
    }

    pub const fn xy(x: f64, y: f64) -> Self {
        Self::new().with(Axis::X, x).with(Axis::Y, y)
    }

    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self::xy(x, y).with(Axis::Z, z)
    }

    /// X/Y/Z of a full position.
    pub fn xyz_of(p: &Position) -> Self {
        Self::xyz(p.x(), p.y(), p.z())
    }

    #[inline]
    pub fn get(&self, axis: Axis) -> Option<f64> {
        self.0[axis.index()]
    }

    /// Named axes in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        Axis::ALL
            .iter()
            .zip(self.0.iter())
            .filter_map(|(axis, v)| v.map(|v| (*axis, v)))
    }

    /// Apply this target over `from`: named axes take the target value.
    pub fn resolve(&self, from: &Position) -> Position {
        let mut out = *from;
        for (axis, v) in self.iter() {
            out.set(axis, v);
        }
        out
    }
}

impl fmt::Display for AxisTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (axis, v) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}{:.3}", axis.letter(), v)?;
        }
        Ok(())
    }
}

// ─── Motion ─────────────────────────────────────────────────────────

/// What a command asks the motion layer to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Traverse at rapid rate, machine coordinates (G53 G0).
    Rapid(AxisTarget),
    /// Linear feed, machine coordinates (G53 G1).
    Feed { target: AxisTarget, feed_rate: f64 },
    /// Probe toward a work-coordinate Z, alarm on failure (G38.2).
    ProbeToward { z: f64, feed_rate: f64 },
    /// Dwell (G4).
    Dwell(Duration),
    /// Dynamic tool-length offset (G43.1).
    ToolLengthOffset(f64),
    /// Distance mode (G90 / G91).
    DistanceMode(DistanceMode),
    /// Spindle (M3 / M4 / M5).
    Spindle(SpindleState),
}

/// A motion command plus its synchronization flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCommand {
    pub motion: Motion,
    /// Block until the queue has drained this command.
    pub sync: bool,
}

impl MotionCommand {
    const fn queued(motion: Motion) -> Self {
        Self {
            motion,
            sync: false,
        }
    }

    pub const fn rapid(target: AxisTarget) -> Self {
        Self::queued(Motion::Rapid(target))
    }

    pub const fn feed(target: AxisTarget, feed_rate: f64) -> Self {
        Self::queued(Motion::Feed { target, feed_rate })
    }

    pub const fn probe_toward(z: f64, feed_rate: f64) -> Self {
        Self::queued(Motion::ProbeToward { z, feed_rate })
    }

    pub const fn dwell(duration: Duration) -> Self {
        Self::queued(Motion::Dwell(duration))
    }

    pub const fn apply_tool_length_offset(z: f64) -> Self {
        Self::queued(Motion::ToolLengthOffset(z))
    }

    pub const fn distance_mode(mode: DistanceMode) -> Self {
        Self::queued(Motion::DistanceMode(mode))
    }

    pub const fn spindle(state: SpindleState) -> Self {
        Self::queued(Motion::Spindle(state))
    }

    /// Mark the command as a barrier.
    pub const fn synced(mut self) -> Self {
        self.sync = true;
        self
    }

    /// True for commands that move an axis.
    pub const fn is_motion(&self) -> bool {
        matches!(
            self.motion,
            Motion::Rapid(_) | Motion::Feed { .. } | Motion::ProbeToward { .. }
        )
    }
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.motion {
            Motion::Rapid(target) => write!(f, "G53 G0 {target}"),
            Motion::Feed { target, feed_rate } => write!(f, "G53 G1 F{feed_rate} {target}"),
            Motion::ProbeToward { z, feed_rate } => write!(f, "G38.2 F{feed_rate} Z{z:.3}"),
            Motion::Dwell(d) => write!(f, "G4 P{:.3}", d.as_secs_f64()),
            Motion::ToolLengthOffset(z) => write!(f, "G43.1 Z{z:.3}"),
            Motion::DistanceMode(DistanceMode::Absolute) => f.write_str("G90"),
            Motion::DistanceMode(DistanceMode::Incremental) => f.write_str("G91"),
            Motion::Spindle(SpindleState::Clockwise) => f.write_str("M3"),
            Motion::Spindle(SpindleState::CounterClockwise) => f.write_str("M4"),
            Motion::Spindle(SpindleState::Off) => f.write_str("M5"),
        }
    }
}
