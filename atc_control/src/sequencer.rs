//! Tool-change sequencer and dispatcher entry points.
//!
//! Runs one tool change to completion or first failure. Phases follow a
//! fixed linear order; a failure stops the sequence where it happened and
//! leaves the machine at its last commanded position.
//!
//! ## Phases
//!
//! | Phase                    | Action                                              |
//! |--------------------------|-----------------------------------------------------|
//! | PreconditionCheck        | Range, no-op, alarm; snapshot position and G90/G91  |
//! | SpindleSpindown          | M5, record spin-down deadline (spindle was on)      |
//! | ParkAtSafeHeight         | Z to `top_of_z`                                     |
//! | ReturnCurrentTool        | Put the held tool back in its pocket (not empty)    |
//! | MoveToSetterPlane        | Target 0: park over the tool setter, done           |
//! | MoveAboveTarget          | Over the target pocket at release height            |
//! | OpenClamp → CloseClamp   | Grab the tool                                       |
//! | SettleDelay              | Let the grip seat                                   |
//! | WithdrawFromRack         | Feed out of the clip, raise                         |
//! | ProbeNewTool             | Tool-setter calibration                             |
//! | SpindleSpinupRequested   | M3/M4 again, record spin-up deadline                |
//! | ReturnToSavedXY          | Back over the saved X/Y at `top_of_z`               |
//! | RestoreModalDistanceMode | G91 again if the change started incremental         |
//! | WaitSpinupDeadline       | Block until the spindle is up to speed              |
//!
//! Every synced motion is followed by a controller alarm check, and a
//! loaded change hands back only after a final barrier and alarm check.

use crate::clamp::ClampGate;
use crate::command::{AxisTarget, MotionCommand};
use crate::machine::{Machine, run};
use crate::manual;
use crate::probe::{ProbeCycle, ProbeReport};
use crate::spindle::SpindleCoordinator;
use crate::state::ToolChangerState;
use crate::tool_table::ToolTable;
use atc_common::atc::config::AtcConfig;
use atc_common::atc::error::AtcError;
use atc_common::atc::types::{Axis, DistanceMode, Position, SpindleState};
use atc_common::config::ConfigError;
use atc_common::consts::TOOL_SETTER_INDEX;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

// ─── Request / Outcome ──────────────────────────────────────────────

/// How the change is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeMode {
    /// Rack sequence with tool-setter calibration.
    #[default]
    Automatic,
    /// Operator swapped the tool by hand: bookkeeping only.
    Manual,
}

/// Successful result of [`ToolChanger::request_tool_change`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeOutcome {
    /// Target already in the spindle; nothing was issued.
    AlreadyLoaded(u8),
    /// Manual mode: current tool recorded, nothing was issued.
    Assigned(u8),
    /// Spindle emptied and parked over the tool setter.
    Unloaded,
    /// Tool loaded and calibrated.
    Loaded(ProbeReport),
}

/// Sequencer phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ChangePhase {
    #[default]
    Idle,
    PreconditionCheck,
    SpindleSpindown,
    ParkAtSafeHeight,
    ReturnCurrentTool,
    MoveToSetterPlane,
    MoveAboveTarget,
    OpenClamp,
    DescendToGrab,
    CloseClamp,
    SettleDelay,
    WithdrawFromRack,
    RaiseToSafeHeight,
    ProbeNewTool,
    SpindleSpinupRequested,
    ReturnToSavedXY,
    RestoreModalDistanceMode,
    WaitSpinupDeadline,
    Done,
}

/// Modal state captured before the first motion of a change.
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    position: Position,
    was_incremental: bool,
    spindle: Option<SpindleState>,
}

// ─── Tool Changer ───────────────────────────────────────────────────

/// Owns the tool table, runtime state and the machine handle.
///
/// All mutation funnels through `&mut self`, so at most one change runs at
/// a time.
#[derive(Debug)]
pub struct ToolChanger<M: Machine> {
    machine: M,
    table: ToolTable,
    state: ToolChangerState,
    spindle: SpindleCoordinator,
    clamp: ClampGate,
    probe: ProbeCycle,
    load_offset: Position,
    release_offset: Position,
    rack_feed_rate: f64,
    grab_settle: Duration,
    phase: ChangePhase,
}

impl<M: Machine> ToolChanger<M> {
    /// Build the tool changer. `top_of_z` is derived from the machine's Z
    /// travel limit and homing pull-off.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` on invalid configuration.
    pub fn new(config: &AtcConfig, machine: M) -> Result<Self, ConfigError> {
        config.validate()?;
        let table = ToolTable::from_config(config)?;
        let top_of_z = machine.max_travel(Axis::Z) - machine.homing_pulloff();
        info!(
            "ATC init: {} rack slots, top of Z {:.3}",
            table.slot_count(),
            top_of_z
        );

        Ok(Self {
            machine,
            table,
            state: ToolChangerState::new(top_of_z),
            spindle: SpindleCoordinator::new(config.timing.spindown(), config.timing.spinup()),
            clamp: ClampGate,
            probe: ProbeCycle::from_config(config),
            load_offset: config.offsets.load,
            release_offset: config.offsets.release,
            rack_feed_rate: config.motion.rack_feed_rate,
            grab_settle: config.timing.grab_settle(),
            phase: ChangePhase::Idle,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    pub fn into_machine(self) -> M {
        self.machine
    }

    pub fn table(&self) -> &ToolTable {
        &self.table
    }

    pub fn state(&self) -> &ToolChangerState {
        &self.state
    }

    /// Last phase entered. After a failure, the phase that failed.
    pub fn phase(&self) -> ChangePhase {
        self.phase
    }

    // ── Dispatcher entry points ─────────────────────────────────────

    /// Change to `target` (0 = empty spindle).
    ///
    /// # Errors
    ///
    /// - `AtcError::OutOfRange` before any side effect
    /// - `AtcError::Alarm` if the controller is (or goes) into alarm
    /// - `AtcError::SpindleSafetyViolation` if the clamp gate refuses
    /// - `AtcError::ProbeFailed` if the new tool cannot be measured
    /// - `AtcError::Machine` if the motion layer rejects a command
    pub fn request_tool_change(
        &mut self,
        target: u8,
        mode: ChangeMode,
    ) -> Result<ChangeOutcome, AtcError> {
        info!(
            "ATC tool change request for tool {}, current tool {}",
            target,
            self.state.current_tool()
        );
        self.enter(ChangePhase::PreconditionCheck);

        if target > self.table.slot_count() {
            warn!("ATC tool out of range: {}", target);
            return Err(AtcError::OutOfRange {
                requested: target,
                slot_count: self.table.slot_count(),
            });
        }

        if mode == ChangeMode::Manual {
            self.state.set_current_tool(target);
            info!("Manual tool change to {}", target);
            self.enter(ChangePhase::Done);
            return Ok(ChangeOutcome::Assigned(target));
        }

        if target == self.state.current_tool() {
            info!("ATC existing tool requested: {}", target);
            self.enter(ChangePhase::Done);
            return Ok(ChangeOutcome::AlreadyLoaded(target));
        }

        if let Some(alarm) = self.machine.alarm() {
            warn!("ATC refused: controller in alarm ({:?})", alarm);
            return Err(AtcError::Alarm(alarm));
        }

        let outcome = self.run_sequence(target)?;
        self.enter(ChangePhase::Done);
        info!("ATC tool change done");
        Ok(outcome)
    }

    /// Probe-notification hook, called for every completed probe.
    ///
    /// The notification refers to the machine's latest probe. A probe run by
    /// the tool-setter cycle was claimed when the cycle returned, so its
    /// notification arriving here is ignored. Returns true if the work-zero
    /// reference tool changed.
    pub fn notify_probe_completed(&mut self) -> bool {
        let sequence = self.machine.probe_sequence();
        let alarm_active = self.machine.alarm().is_some();
        self.state.on_probe_completed(sequence, alarm_active)
    }

    /// User macro. Id 0 toggles the clamp; others are undefined.
    pub fn invoke_macro(&mut self, id: u8) -> Result<(), AtcError> {
        info!("Macro: {}", id);
        match id {
            0 => self.toggle_clamp().map(|_| ()),
            _ => {
                warn!("Undefined macro number: {}", id);
                Err(AtcError::UndefinedMacro(id))
            }
        }
    }

    /// Manual clamp toggle. Returns the new clamp state (`true` = open).
    pub fn toggle_clamp(&mut self) -> Result<bool, AtcError> {
        manual::toggle_clamp(&mut self.machine, &self.clamp)
    }

    // ── Sequence ────────────────────────────────────────────────────

    fn run_sequence(&mut self, target: u8) -> Result<ChangeOutcome, AtcError> {
        self.spindle.reset();
        self.machine.synchronize()?;
        let was_incremental = self.machine.distance_mode() == DistanceMode::Incremental;
        let position = self.machine.machine_position();
        if was_incremental {
            run(&mut self.machine, MotionCommand::distance_mode(DistanceMode::Absolute))?;
        }

        self.enter(ChangePhase::SpindleSpindown);
        let spindle = self.spindle.request_spindle_off(&mut self.machine)?;
        let snapshot = Snapshot {
            position,
            was_incremental,
            spindle,
        };

        let top = self.state.top_of_z();
        self.enter(ChangePhase::ParkAtSafeHeight);
        self.step(MotionCommand::rapid(AxisTarget::z(top)).synced())?;

        let current = self.state.current_tool();
        if current != TOOL_SETTER_INDEX {
            self.enter(ChangePhase::ReturnCurrentTool);
            self.return_tool(current)?;
        } else {
            let over = self.table.position_of(target);
            self.enter(ChangePhase::MoveAboveTarget);
            info!("Go on top of new tool at Z{:.3}", top);
            self.step(MotionCommand::rapid(AxisTarget::xyz(over.x(), over.y(), top)).synced())?;
        }
        self.state.set_current_tool(TOOL_SETTER_INDEX);

        if target == TOOL_SETTER_INDEX {
            self.enter(ChangePhase::MoveToSetterPlane);
            let setter = self.table.tool_setter();
            self.step(MotionCommand::rapid(AxisTarget::z(top)).synced())?;
            self.step(MotionCommand::rapid(AxisTarget::xyz(setter.x(), setter.y(), top)).synced())?;
            self.restore_distance_mode(&snapshot)?;
            info!("ATC changed to tool 0");
            return Ok(ChangeOutcome::Unloaded);
        }

        self.load_tool(target)?;

        self.enter(ChangePhase::ProbeNewTool);
        info!("ATC probe new tool");
        let report = self
            .probe
            .probe_current_tool(&mut self.machine, &mut self.table, &mut self.state)?;

        if let Some(state) = snapshot.spindle {
            self.enter(ChangePhase::SpindleSpinupRequested);
            self.spindle.request_spindle_on(&mut self.machine, state)?;
        }

        self.enter(ChangePhase::ReturnToSavedXY);
        let saved = snapshot.position;
        run(
            &mut self.machine,
            MotionCommand::rapid(AxisTarget::xyz(saved.x(), saved.y(), top)),
        )?;
        info!("ATC back to work");

        self.restore_distance_mode(&snapshot)?;

        // The return rapid must have finished without alarm before hand-back.
        self.machine.synchronize()?;
        self.check_alarm()?;

        if snapshot.spindle.is_some() {
            self.enter(ChangePhase::WaitSpinupDeadline);
            self.spindle.wait_for_deadline(&mut self.machine);
        }

        Ok(ChangeOutcome::Loaded(report))
    }

    /// Put `tool` back in its pocket and leave the clamp closed.
    fn return_tool(&mut self, tool: u8) -> Result<(), AtcError> {
        info!("ATC returning tool {}", tool);
        let slot = self.table.position_of(tool);
        let front = slot.offset_by(&self.load_offset);
        let above = slot.offset_by(&self.release_offset);

        run(&mut self.machine, MotionCommand::rapid(AxisTarget::z(self.state.top_of_z())))?;
        debug!("Move in front of tool clip");
        run(&mut self.machine, MotionCommand::rapid(AxisTarget::xy(front.x(), front.y())))?;
        run(&mut self.machine, MotionCommand::rapid(AxisTarget::z(front.z())))?;

        debug!("Move into tool clip");
        self.step(
            MotionCommand::feed(AxisTarget::xy(slot.x(), slot.y()), self.rack_feed_rate).synced(),
        )?;
        self.actuate_clamp(true)?;

        debug!("Move on top of tool clip");
        self.step(MotionCommand::feed(AxisTarget::xyz_of(&above), self.rack_feed_rate).synced())?;
        self.actuate_clamp(false)
    }

    /// Grab `tool` from its pocket and lift it clear of the rack.
    fn load_tool(&mut self, tool: u8) -> Result<(), AtcError> {
        info!("ATC loading tool {}", tool);
        let slot = self.table.position_of(tool);
        let above = slot.offset_by(&self.release_offset);
        let out = slot.offset_by(&self.load_offset);

        self.enter(ChangePhase::MoveAboveTarget);
        self.step(MotionCommand::rapid(AxisTarget::z(self.state.top_of_z())).synced())?;
        self.step(MotionCommand::rapid(AxisTarget::xyz_of(&above)).synced())?;

        self.enter(ChangePhase::OpenClamp);
        self.actuate_clamp(true)?;

        self.enter(ChangePhase::DescendToGrab);
        self.step(MotionCommand::feed(AxisTarget::xyz_of(&slot), self.rack_feed_rate).synced())?;

        self.enter(ChangePhase::CloseClamp);
        self.actuate_clamp(false)?;

        self.enter(ChangePhase::SettleDelay);
        self.step(MotionCommand::dwell(self.grab_settle).synced())?;

        self.enter(ChangePhase::WithdrawFromRack);
        self.step(MotionCommand::feed(AxisTarget::xyz_of(&out), self.rack_feed_rate).synced())?;

        self.enter(ChangePhase::RaiseToSafeHeight);
        self.step(MotionCommand::rapid(AxisTarget::z(above.z())).synced())?;

        self.state.set_current_tool(tool);
        info!("ATC tool loaded: {}", tool);
        Ok(())
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn enter(&mut self, phase: ChangePhase) {
        debug!("ATC phase {:?}", phase);
        self.phase = phase;
    }

    /// Blocking step: run the command, then fail if the controller alarmed.
    fn step(&mut self, command: MotionCommand) -> Result<(), AtcError> {
        run(&mut self.machine, command)?;
        self.check_alarm()
    }

    fn check_alarm(&self) -> Result<(), AtcError> {
        match self.machine.alarm() {
            Some(alarm) => {
                warn!("ATC aborted in {:?}: controller alarm {:?}", self.phase, alarm);
                Err(AtcError::Alarm(alarm))
            }
            None => Ok(()),
        }
    }

    /// Clamp actuation, after any pending spin-down has elapsed.
    fn actuate_clamp(&mut self, open: bool) -> Result<(), AtcError> {
        self.spindle.wait_for_deadline(&mut self.machine);
        self.clamp.set_open(&mut self.machine, open)
    }

    fn restore_distance_mode(&mut self, snapshot: &Snapshot) -> Result<(), AtcError> {
        if snapshot.was_incremental {
            self.enter(ChangePhase::RestoreModalDistanceMode);
            run(&mut self.machine, MotionCommand::distance_mode(DistanceMode::Incremental))?;
        }
        Ok(())
    }
}
