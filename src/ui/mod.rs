//! ui
//!
//! User-facing terminal output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! Messages meant for the person running `binreg` go through this module and
//! respect `--quiet` / `--debug`. Diagnostics from library code go through
//! `tracing` instead.

pub mod output;
