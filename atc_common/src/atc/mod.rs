//! Tool-changer shared types.
//!
//! Everything the tool changer shares with the dispatcher, the simulator and
//! configuration tooling lives here: machine value types, the error
//! taxonomy, and the configuration structures.

pub mod config;
pub mod error;
pub mod types;
