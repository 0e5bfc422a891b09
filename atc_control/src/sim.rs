//! Simulated machine for development and testing without hardware.
//!
//! `SimMachine` implements every machine trait on a virtual clock. Motion
//! completes instantly in wall time but advances the clock by
//! `distance / rate`, dwells and sleeps advance it by their duration. Every
//! command, output change, sleep and barrier is recorded with its timestamp.
//!
//! Fault injection hooks cover the failure paths of a tool change: a stuck
//! probe switch, a probe that never triggers, a spindle that ignores M5,
//! an alarm latched on the N-th command, a rejected command.

use crate::command::{Motion, MotionCommand};
use crate::machine::{Clock, DigitalOutputs, ModalQuery, MotionExecutor, ProbeQuery};
use atc_common::atc::error::MachineError;
use atc_common::atc::types::{
    AlarmKind, Axis, ControllerState, DigitalOutput, DistanceMode, Position, SpindleState,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

/// Simulated machine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Upper travel limit per axis (machine coordinates).
    #[serde(default = "default_max_travel")]
    pub max_travel: Position,
    /// Homing pull-off distance.
    #[serde(default = "default_homing_pulloff")]
    pub homing_pulloff: f64,
    /// Rapid traverse rate [mm/min].
    #[serde(default = "default_rapid_rate")]
    pub rapid_rate: f64,
    /// Machine Z at which the tool setter triggers when no contact is queued.
    /// `None` = the probe never triggers.
    #[serde(default = "default_probe_contact_z")]
    pub probe_contact_z: Option<f64>,
    /// Machine position at power-up.
    #[serde(default)]
    pub start_position: Position,
}

fn default_max_travel() -> Position {
    Position::xyz(0.0, 0.0, 0.0)
}
fn default_homing_pulloff() -> f64 {
    1.0
}
fn default_rapid_rate() -> f64 {
    5000.0
}
fn default_probe_contact_z() -> Option<f64> {
    Some(-30.0)
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_travel: default_max_travel(),
            homing_pulloff: default_homing_pulloff(),
            rapid_rate: default_rapid_rate(),
            probe_contact_z: default_probe_contact_z(),
            start_position: Position::default(),
        }
    }
}

// ─── Event Log ──────────────────────────────────────────────────────

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEventKind {
    /// A command was accepted into the queue.
    Command(MotionCommand),
    /// A digital output was written.
    Output { output: DigitalOutput, on: bool },
    /// Explicit barrier.
    Synchronize,
    /// Caller slept.
    Sleep(Duration),
}

/// Timestamped event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimEvent {
    /// Virtual time when the event started.
    pub at: Duration,
    pub kind: SimEventKind,
}

// ─── Simulated Machine ──────────────────────────────────────────────

/// Software machine implementing [`crate::machine::Machine`].
#[derive(Debug)]
pub struct SimMachine {
    config: SimConfig,
    clock: Duration,
    position: Position,
    probe_position: Position,
    spindle: SpindleState,
    distance: DistanceMode,
    work_offset: Position,
    tool_length_offset: f64,
    controller: ControllerState,
    alarm: Option<AlarmKind>,
    clamp_open: bool,
    dust_off: bool,
    /// Per-probe contact heights, consumed in order.
    contacts: VecDeque<Option<f64>>,
    probe_switch_stuck: bool,
    spindle_jammed: bool,
    alarm_on_command: Option<(usize, AlarmKind)>,
    reject_next: Option<String>,
    executed: usize,
    probes: u64,
    events: Vec<SimEvent>,
}

impl SimMachine {
    pub fn new(config: SimConfig) -> Self {
        let position = config.start_position;
        Self {
            config,
            clock: Duration::ZERO,
            position,
            probe_position: position,
            spindle: SpindleState::Off,
            distance: DistanceMode::Absolute,
            work_offset: Position::default(),
            tool_length_offset: 0.0,
            controller: ControllerState::Idle,
            alarm: None,
            clamp_open: false,
            dust_off: false,
            contacts: VecDeque::new(),
            probe_switch_stuck: false,
            spindle_jammed: false,
            alarm_on_command: None,
            reject_next: None,
            executed: 0,
            probes: 0,
            events: Vec::new(),
        }
    }

    // ── Scenario setup ──────────────────────────────────────────────

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn set_spindle(&mut self, state: SpindleState) {
        self.spindle = state;
    }

    pub fn set_distance_mode(&mut self, mode: DistanceMode) {
        self.distance = mode;
    }

    pub fn set_work_offset(&mut self, axis: Axis, value: f64) {
        self.work_offset.set(axis, value);
    }

    pub fn set_controller_state(&mut self, state: ControllerState) {
        self.controller = state;
    }

    /// Queue the machine Z at which the next probe triggers (`None` = miss).
    pub fn queue_probe_contact(&mut self, contact_z: Option<f64>) {
        self.contacts.push_back(contact_z);
    }

    /// Probe input reads triggered before any probing move.
    pub fn stick_probe_switch(&mut self) {
        self.probe_switch_stuck = true;
    }

    /// Spindle keeps running after M5.
    pub fn jam_spindle(&mut self) {
        self.spindle_jammed = true;
    }

    /// Latch `alarm` when the `n`-th command (1-based, counted from now) executes.
    pub fn alarm_on_command(&mut self, n: usize, alarm: AlarmKind) {
        self.alarm_on_command = Some((self.executed + n, alarm));
    }

    /// Refuse the next command with `reason`.
    pub fn reject_next_command(&mut self, reason: &str) {
        self.reject_next = Some(reason.to_string());
    }

    /// Advance the virtual clock without recording an event.
    pub fn advance(&mut self, duration: Duration) {
        self.clock += duration;
    }

    /// Clear a latched alarm (operator reset).
    pub fn reset_alarm(&mut self) {
        self.alarm = None;
        self.controller = ControllerState::Idle;
    }

    // ── Inspection ──────────────────────────────────────────────────

    #[inline]
    pub fn clock(&self) -> Duration {
        self.clock
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    #[inline]
    pub fn spindle_state(&self) -> SpindleState {
        self.spindle
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Accepted commands in order.
    pub fn commands(&self) -> Vec<MotionCommand> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                SimEventKind::Command(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Number of commands that move an axis.
    pub fn motion_count(&self) -> usize {
        self.commands().iter().filter(|c| c.is_motion()).count()
    }

    /// Number of writes to `output`.
    pub fn output_changes(&self, output: DigitalOutput) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, SimEventKind::Output { output: o, .. } if o == output))
            .count()
    }

    // ── Internals ───────────────────────────────────────────────────

    fn record(&mut self, kind: SimEventKind) {
        self.events.push(SimEvent {
            at: self.clock,
            kind,
        });
    }

    fn latch_alarm(&mut self, alarm: AlarmKind) {
        debug!("Sim alarm latched: {:?}", alarm);
        self.alarm = Some(alarm);
        self.controller = ControllerState::Alarm;
    }

    fn travel(&mut self, to: Position, rate_mm_per_min: f64) {
        let distance = self.position.distance_to(&to);
        if rate_mm_per_min > 0.0 {
            self.clock += Duration::from_secs_f64(distance / rate_mm_per_min * 60.0);
        }
        self.position = to;
    }

    fn probe(&mut self, work_z: f64, feed_rate: f64) {
        self.probes += 1;
        if self.probe_switch_stuck {
            self.latch_alarm(AlarmKind::ProbeFailInitial);
            return;
        }

        let target_z = work_z + self.work_offset.z() + self.tool_length_offset;
        let contact = self
            .contacts
            .pop_front()
            .unwrap_or(self.config.probe_contact_z);

        let mut end = self.position;
        match contact {
            Some(c) if c <= self.position.z() && c >= target_z => {
                end.set(Axis::Z, c);
                self.travel(end, feed_rate);
                self.probe_position = self.position;
                trace!("Sim probe triggered at Z{:.3}", c);
            }
            _ => {
                end.set(Axis::Z, target_z);
                self.travel(end, feed_rate);
                self.latch_alarm(AlarmKind::ProbeFailContact);
            }
        }
    }
}

impl Default for SimMachine {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl MotionExecutor for SimMachine {
    fn execute(&mut self, command: &MotionCommand) -> Result<(), MachineError> {
        if let Some(reason) = self.reject_next.take() {
            return Err(MachineError::Rejected(reason));
        }

        self.record(SimEventKind::Command(*command));
        self.executed += 1;
        if let Some((n, alarm)) = self.alarm_on_command {
            if self.executed == n {
                self.alarm_on_command = None;
                self.latch_alarm(alarm);
            }
        }

        // A latched alarm halts the queue: commands are accepted but not run.
        if self.alarm.is_some() {
            return Ok(());
        }

        match command.motion {
            Motion::Rapid(target) => {
                let to = target.resolve(&self.position);
                self.travel(to, self.config.rapid_rate);
            }
            Motion::Feed { target, feed_rate } => {
                let to = target.resolve(&self.position);
                self.travel(to, feed_rate);
            }
            Motion::ProbeToward { z, feed_rate } => self.probe(z, feed_rate),
            Motion::Dwell(d) => self.clock += d,
            Motion::ToolLengthOffset(z) => self.tool_length_offset = z,
            Motion::DistanceMode(mode) => self.distance = mode,
            Motion::Spindle(state) => {
                if !(self.spindle_jammed && state == SpindleState::Off) {
                    self.spindle = state;
                }
            }
        }
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), MachineError> {
        self.record(SimEventKind::Synchronize);
        Ok(())
    }
}

impl ModalQuery for SimMachine {
    fn spindle(&self) -> SpindleState {
        self.spindle
    }

    fn distance_mode(&self) -> DistanceMode {
        self.distance
    }

    fn work_offset(&self, axis: Axis) -> f64 {
        self.work_offset.get(axis)
    }

    fn tool_length_offset(&self) -> f64 {
        self.tool_length_offset
    }

    fn machine_position(&self) -> Position {
        self.position
    }

    fn max_travel(&self, axis: Axis) -> f64 {
        self.config.max_travel.get(axis)
    }

    fn homing_pulloff(&self) -> f64 {
        self.config.homing_pulloff
    }
}

impl ProbeQuery for SimMachine {
    fn probe_position(&self) -> Position {
        self.probe_position
    }

    fn probe_sequence(&self) -> u64 {
        self.probes
    }

    fn controller_state(&self) -> ControllerState {
        self.controller
    }

    fn alarm(&self) -> Option<AlarmKind> {
        self.alarm
    }
}

impl DigitalOutputs for SimMachine {
    fn set_output(&mut self, output: DigitalOutput, on: bool) {
        self.record(SimEventKind::Output { output, on });
        match output {
            DigitalOutput::ClampRelease => self.clamp_open = on,
            DigitalOutput::DustOff => self.dust_off = on,
        }
    }

    fn read_output(&self, output: DigitalOutput) -> bool {
        match output {
            DigitalOutput::ClampRelease => self.clamp_open,
            DigitalOutput::DustOff => self.dust_off,
        }
    }
}

impl Clock for SimMachine {
    fn now(&self) -> Duration {
        self.clock
    }

    fn sleep(&mut self, duration: Duration) {
        self.record(SimEventKind::Sleep(duration));
        self.clock += duration;
    }
}
