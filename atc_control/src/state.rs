//! Process-wide tool-changer state.
//!
//! Written only by the sequencer and by the probe-notification hook. The
//! owning [`crate::sequencer::ToolChanger`] is the single writer; `&mut`
//! access through it rules out interleaved changes.

use atc_common::consts::TOOL_SETTER_INDEX;
use serde::Serialize;
use tracing::{debug, info};

/// Runtime state of the tool changer.
#[derive(Debug, Clone, Serialize)]
pub struct ToolChangerState {
    current_tool: u8,
    zeroed_tool: Option<u8>,
    top_of_z: f64,
    tool_setter_probing: bool,
    /// Last probe already accounted for: a tool-setter probe, or a
    /// workpiece probe whose notification was handled.
    claimed_probe: Option<u64>,
}

impl ToolChangerState {
    /// Fresh state with an empty spindle and no reference tool.
    pub fn new(top_of_z: f64) -> Self {
        Self {
            current_tool: TOOL_SETTER_INDEX,
            zeroed_tool: None,
            top_of_z,
            tool_setter_probing: false,
            claimed_probe: None,
        }
    }

    /// Tool physically in the spindle; 0 = empty.
    #[inline]
    pub fn current_tool(&self) -> u8 {
        self.current_tool
    }

    /// Tool whose probed offset defines the work-zero reference.
    ///
    /// `None` until a workpiece probe completes with a tool loaded.
    #[inline]
    pub fn zeroed_tool(&self) -> Option<u8> {
        self.zeroed_tool
    }

    /// Common safe-travel Z for rack traversal (machine coordinates).
    #[inline]
    pub fn top_of_z(&self) -> f64 {
        self.top_of_z
    }

    /// True only while a tool-setter probe is in flight.
    #[inline]
    pub fn tool_setter_probing(&self) -> bool {
        self.tool_setter_probing
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current_tool == TOOL_SETTER_INDEX
    }

    pub(crate) fn set_current_tool(&mut self, tool: u8) {
        self.current_tool = tool;
    }

    pub(crate) fn begin_setter_probe(&mut self) {
        self.tool_setter_probing = true;
    }

    /// Clear the in-flight flag and claim the probe `sequence` as a
    /// tool-setter probe, so its later notification is ignored.
    pub(crate) fn end_setter_probe(&mut self, sequence: Option<u64>) {
        self.tool_setter_probing = false;
        if sequence.is_some() {
            self.claimed_probe = sequence;
        }
    }

    /// Probe-notification hook for the probe numbered `sequence`.
    ///
    /// Called for every completed probe. Tool-setter probes, failed probes
    /// (controller in alarm) and probes already handled are ignored; any
    /// other probe makes the loaded tool the work-zero reference. Returns
    /// true if the reference changed.
    pub fn on_probe_completed(&mut self, sequence: u64, alarm_active: bool) -> bool {
        if sequence == 0 {
            debug!("Probe notification ignored: no probe has run");
            return false;
        }
        if self.tool_setter_probing || self.claimed_probe == Some(sequence) {
            debug!("Probe notification ignored: probe {} already claimed", sequence);
            return false;
        }
        self.claimed_probe = Some(sequence);
        if alarm_active {
            debug!("Probe notification ignored: probe failed");
            return false;
        }

        let reference = (!self.is_empty()).then_some(self.current_tool);
        if reference == self.zeroed_tool {
            return false;
        }
        self.zeroed_tool = reference;
        match reference {
            Some(tool) => info!("Tool {} zeroed on workpiece, now the length reference", tool),
            None => info!("Workpiece probe with empty spindle, length reference cleared"),
        }
        true
    }
}
