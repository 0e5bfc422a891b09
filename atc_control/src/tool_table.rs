//! Tool table: slot → machine position and calibrated offset.
//!
//! Slot 0 is the fixed tool setter; its position is the probe target, never
//! a pickup point. Slots `1..=slot_count` are the rack pockets, laid out as
//! `base + pitch × (slot − 1)`. Positions are fixed after construction;
//! offsets are written by the probe cycle.

use atc_common::atc::config::AtcConfig;
use atc_common::atc::types::{Axis, Position};
use atc_common::config::ConfigError;
use atc_common::consts::TOOL_SETTER_INDEX;
use serde::Serialize;

/// One rack position (or the tool setter).
#[derive(Debug, Clone, Serialize)]
pub struct ToolSlot {
    /// Pickup location in machine coordinates.
    pub machine_position: Position,
    /// Per-axis offset, primarily the probed Z of the tool last calibrated in this slot.
    pub calibrated_offset: Position,
    /// Set once a probe cycle has recorded an offset for this slot.
    pub calibrated: bool,
}

impl ToolSlot {
    fn at(machine_position: Position) -> Self {
        Self {
            calibrated_offset: Position::zero(machine_position.len()),
            machine_position,
            calibrated: false,
        }
    }
}

/// Ordered slot table, index 0 = tool setter.
#[derive(Debug, Clone, Serialize)]
pub struct ToolTable {
    slots: Vec<ToolSlot>,
}

impl ToolTable {
    /// Build the table from rack geometry.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` if the rack has no slots.
    pub fn new(
        slot_count: u8,
        base: &Position,
        pitch: &Position,
        tool_setter: &Position,
    ) -> Result<Self, ConfigError> {
        if slot_count == 0 {
            return Err(ConfigError::ValidationError(
                "tool table needs at least one rack slot".to_string(),
            ));
        }

        let mut slots = Vec::with_capacity(slot_count as usize + 1);
        slots.push(ToolSlot::at(*tool_setter));
        slots.extend((0..slot_count).map(|i| ToolSlot::at(base.offset_by(&pitch.scaled(f64::from(i))))));

        Ok(Self { slots })
    }

    /// Build the table from a full configuration.
    pub fn from_config(config: &AtcConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.rack.slot_count,
            &config.rack.base,
            &config.rack.pitch,
            &config.tool_setter.position,
        )
    }

    /// Number of rack slots (excluding the tool setter).
    #[inline]
    pub fn slot_count(&self) -> u8 {
        // Construction bounds the table to u8::MAX rack slots plus the setter.
        (self.slots.len() - 1) as u8
    }

    /// True if `slot` names the tool setter or a rack pocket.
    #[inline]
    pub fn contains(&self, slot: u8) -> bool {
        (slot as usize) < self.slots.len()
    }

    /// Slot entry, `None` past the end of the rack.
    pub fn slot(&self, slot: u8) -> Option<&ToolSlot> {
        self.slots.get(slot as usize)
    }

    /// Machine position of `slot`.
    ///
    /// # Panics
    ///
    /// If `slot` is outside the table; callers validate at the boundary.
    pub fn position_of(&self, slot: u8) -> Position {
        self.slots[slot as usize].machine_position
    }

    /// Machine position of the tool setter.
    pub fn tool_setter(&self) -> Position {
        self.position_of(TOOL_SETTER_INDEX)
    }

    /// Record a calibrated offset for `slot` on `axis`.
    pub fn record_offset(&mut self, slot: u8, axis: Axis, value: f64) {
        if let Some(entry) = self.slots.get_mut(slot as usize) {
            entry.calibrated_offset.set(axis, value);
            entry.calibrated = true;
        }
    }

    /// Calibrated offset of `slot` on `axis`; zero until first calibration.
    pub fn offset_of(&self, slot: u8, axis: Axis) -> f64 {
        self.slots
            .get(slot as usize)
            .map_or(0.0, |entry| entry.calibrated_offset.get(axis))
    }

    /// Whether `slot` was ever calibrated.
    pub fn calibrated(&self, slot: u8) -> bool {
        self.slots.get(slot as usize).is_some_and(|entry| entry.calibrated)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &ToolSlot)> {
        self.slots.iter().enumerate().map(|(i, s)| (i as u8, s))
    }
}
