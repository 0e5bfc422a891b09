//! Machine-level value types shared by the tool changer and its collaborators.
//!
//! Axes and coordinates, the modal flags the sequencer reads and restores
//! (distance mode, spindle), controller run state, alarm kinds and the
//! digital outputs driven by the tool changer.

use crate::consts::{MAX_N_AXIS, MIN_N_AXIS};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ─── Axes ───────────────────────────────────────────────────────────

/// Machine axis identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
    A = 3,
    B = 4,
    C = 5,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; MAX_N_AXIS] = [Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B, Axis::C];

    /// Array index of this axis.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// G-code word letter.
    #[inline]
    pub const fn letter(self) -> char {
        match self {
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
        }
    }
}

// ─── Position ───────────────────────────────────────────────────────

/// Reason a list of axis values was rejected as a coordinate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    /// Fewer than X/Y/Z or more than the supported axes.
    #[error("expected {min}..={max} axis values, got {0}", min = MIN_N_AXIS, max = MAX_N_AXIS)]
    AxisCount(usize),
    /// NaN or infinite component.
    #[error("axis value {0} is not finite")]
    NotFinite(f64),
}

/// A 3-to-N-axis machine coordinate.
///
/// Fixed capacity; axes beyond `len` read as zero. Deserializes from a TOML
/// array such as `[-160.0, -0.5, -45.0]`.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Position {
    values: [f64; MAX_N_AXIS],
    len: usize,
}

impl Position {
    /// Build from a slice of axis values (X first).
    pub fn new(values: &[f64]) -> Result<Self, PositionError> {
        if !(MIN_N_AXIS..=MAX_N_AXIS).contains(&values.len()) {
            return Err(PositionError::AxisCount(values.len()));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(PositionError::NotFinite(*bad));
        }
        let mut out = [0.0; MAX_N_AXIS];
        out[..values.len()].copy_from_slice(values);
        Ok(Self {
            values: out,
            len: values.len(),
        })
    }

    /// Three-axis coordinate.
    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            values: [x, y, z, 0.0, 0.0, 0.0],
            len: 3,
        }
    }

    /// Origin with `len` axes (clamped to the supported range).
    pub fn zero(len: usize) -> Self {
        Self {
            values: [0.0; MAX_N_AXIS],
            len: len.clamp(MIN_N_AXIS, MAX_N_AXIS),
        }
    }

    /// Number of axes carried.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always false: a coordinate carries at least X/Y/Z.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn get(&self, axis: Axis) -> f64 {
        self.values[axis.index()]
    }

    /// Set one axis; widens the coordinate if the axis was not carried.
    pub fn set(&mut self, axis: Axis, value: f64) {
        self.values[axis.index()] = value;
        self.len = self.len.max(axis.index() + 1);
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.get(Axis::X)
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.get(Axis::Y)
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.get(Axis::Z)
    }

    /// Carried axis values.
    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.len]
    }

    /// Component-wise sum; the result carries the wider axis count.
    pub fn offset_by(&self, other: &Position) -> Position {
        let mut values = self.values;
        for (v, o) in values.iter_mut().zip(other.values.iter()) {
            *v += o;
        }
        Position {
            values,
            len: self.len.max(other.len),
        }
    }

    /// Component-wise scale.
    pub fn scaled(&self, factor: f64) -> Position {
        let mut values = self.values;
        for v in values.iter_mut() {
            *v *= factor;
        }
        Position {
            values,
            len: self.len,
        }
    }

    /// Euclidean distance over the carried axes of both coordinates.
    pub fn distance_to(&self, other: &Position) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .take(self.len.max(other.len))
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::zero(MIN_N_AXIS)
    }
}

impl TryFrom<Vec<f64>> for Position {
    type Error = PositionError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(&values)
    }
}

impl From<Position> for Vec<f64> {
    fn from(position: Position) -> Self {
        position.as_slice().to_vec()
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.as_slice().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}{:.3}", Axis::ALL[i].letter(), v)?;
        }
        Ok(())
    }
}

// ─── Modal State ────────────────────────────────────────────────────

/// Distance mode (G90 / G91).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceMode {
    #[default]
    Absolute,
    Incremental,
}

/// Spindle state (M3 / M4 / M5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpindleState {
    #[default]
    Off,
    Clockwise,
    CounterClockwise,
}

impl SpindleState {
    /// Returns true if the spindle is powered in either direction.
    #[inline]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

// ─── Controller Run State ───────────────────────────────────────────

/// Controller run state as reported by the motion platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControllerState {
    /// No motion queued or running.
    #[default]
    Idle,
    /// Program or queued motion executing.
    Cycle,
    /// Feed hold.
    Hold,
    /// Homing cycle in progress.
    Homing,
    /// Alarm latched; see [`AlarmKind`].
    Alarm,
}

/// Alarm reason reported alongside `ControllerState::Alarm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmKind {
    /// Probe already triggered before the probing move started.
    ProbeFailInitial,
    /// Probing move finished without the probe triggering.
    ProbeFailContact,
    /// Hard limit switch tripped.
    HardLimit,
    /// Target outside soft limits.
    SoftLimit,
    /// Cycle aborted by reset during motion.
    AbortCycle,
}

// ─── Digital Outputs ────────────────────────────────────────────────

/// Binary outputs driven by the tool changer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigitalOutput {
    /// Clamp release actuator; `true` = clamp open.
    ClampRelease,
    /// Air blast over the tool setter.
    DustOff,
}
