//! core
//!
//! Core domain types, key encoding, configuration and paths.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ProgramIdentifier, ProgramBinary, SlotIndex, etc.
//! - [`key`] - Identifier to radix-word key encoding
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized artifact naming
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Key encoding is deterministic and shared by writer and reader

pub mod config;
pub mod key;
pub mod paths;
pub mod types;
