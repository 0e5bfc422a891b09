//! ATC Common Library
//!
//! This crate provides the shared types, error taxonomy, constants and
//! configuration loading utilities for all ATC workspace crates.
//!
//! # Module Structure
//!
//! - [`atc`] - Tool-changer types, configuration and errors
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Workspace-wide constants
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use atc_common::prelude::*;
//! use atc_common::config::{ConfigLoader, SharedConfig};
//! ```

pub mod atc;
pub mod config;
pub mod consts;
pub mod prelude;
