//! Spindle spin-down / spin-up coordinator.
//!
//! Switching the spindle records an absolute deadline instead of sleeping on
//! the spot. The sequencer keeps issuing motion and waits out the deadline
//! only at the point where it matters (clamp actuation, hand-back to the
//! dispatcher), so travel overlaps deceleration and acceleration.

use crate::command::MotionCommand;
use crate::machine::{Machine, run};
use atc_common::atc::error::AtcError;
use atc_common::atc::types::SpindleState;
use std::time::Duration;
use tracing::{debug, info};

/// Time still to wait before `deadline`; zero once it has passed.
#[inline]
pub fn remaining_wait(deadline: Duration, now: Duration) -> Duration {
    deadline.saturating_sub(now)
}

/// Tracks the pending spindle deadline.
#[derive(Debug, Clone)]
pub struct SpindleCoordinator {
    spindown: Duration,
    spinup: Duration,
    deadline: Option<Duration>,
}

impl SpindleCoordinator {
    pub fn new(spindown: Duration, spinup: Duration) -> Self {
        Self {
            spindown,
            spinup,
            deadline: None,
        }
    }

    /// Pending deadline, if the spindle was switched and not yet waited out.
    #[inline]
    pub fn pending_deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Drop a deadline left over from an aborted sequence.
    pub fn reset(&mut self) {
        self.deadline = None;
    }

    /// Turn the spindle off if it is running.
    ///
    /// Returns the state it was in, so the caller can restore it later.
    /// `None` means the spindle was already off and nothing was issued.
    pub fn request_spindle_off<M: Machine>(
        &mut self,
        machine: &mut M,
    ) -> Result<Option<SpindleState>, AtcError> {
        let was = machine.spindle();
        if !was.is_enabled() {
            return Ok(None);
        }

        run(machine, MotionCommand::spindle(SpindleState::Off))?;
        let deadline = machine.now().saturating_add(self.spindown);
        self.deadline = Some(deadline);
        info!(
            "Spindle off, spin-down complete at {:.3}s",
            deadline.as_secs_f64()
        );
        Ok(Some(was))
    }

    /// Turn the spindle back on in `state`.
    pub fn request_spindle_on<M: Machine>(
        &mut self,
        machine: &mut M,
        state: SpindleState,
    ) -> Result<(), AtcError> {
        run(machine, MotionCommand::spindle(state))?;
        let deadline = machine.now().saturating_add(self.spinup);
        self.deadline = Some(deadline);
        info!(
            "Spindle on ({:?}), spin-up complete at {:.3}s",
            state,
            deadline.as_secs_f64()
        );
        Ok(())
    }

    /// Block until the pending deadline has passed.
    ///
    /// Returns the time actually waited: `max(0, deadline - now)`.
    pub fn wait_for_deadline<M: Machine>(&mut self, machine: &mut M) -> Duration {
        let Some(deadline) = self.deadline.take() else {
            return Duration::ZERO;
        };

        let wait = remaining_wait(deadline, machine.now());
        if !wait.is_zero() {
            debug!("Waiting {:.3}s for spindle", wait.as_secs_f64());
            machine.sleep(wait);
        }
        wait
    }
}
