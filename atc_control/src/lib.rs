//! # ATC Control Library
//!
//! Automatic tool-changer core for a CNC motion controller. Swaps tools
//! between the spindle and a linear rack, measures each new tool on a fixed
//! tool setter and applies the length difference against a reference tool
//! zeroed on the workpiece.
//!
//! ## Layers
//!
//! 1. **Machine interface** — traits the motion platform implements
//! 2. **Tool table / state** — rack geometry, calibrated offsets, current tool
//! 3. **Primitives** — spindle deadlines, clamp interlock, probe cycle
//! 4. **Sequencer** — the tool-change state machine and dispatcher hooks
//!
//! ## Clamp Interlock
//!
//! The clamp release output never changes while the spindle reports enabled.
//! Every actuation path goes through [`clamp::ClampGate`].
//!
//! ## Simulation
//!
//! [`sim::SimMachine`] runs the full sequence on a virtual clock and records
//! every command, for tests and the `atc_sim` binary.

pub mod clamp;
pub mod command;
pub mod machine;
pub mod manual;
pub mod probe;
pub mod sequencer;
pub mod sim;
pub mod spindle;
pub mod state;
pub mod tool_table;
