//! binreg - A write-once, read-many registry of compiled program binaries
//!
//! A test run compiles many shader programs, and many of them are
//! byte-identical. The registry stores each distinct binary once and finds
//! it again by `(test case path, program name)` through a radix index, so
//! later runs can skip compilation.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to registry)
//! - [`registry`] - Writer (dedup, index build, publish) and reader (lookup)
//! - [`format`] - On-disk artifact formats and the radix tree
//! - [`resource`] - Seekable resources, archives and lazily paged access
//! - [`core`] - Domain types, key encoding, configuration and paths
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. Every stored `(identifier, binary)` loads back byte-identical
//! 2. Identical binaries occupy one slot
//! 3. A lookup touches only the index pages on its path
//! 4. A failed publish never replaces a published registry

pub mod cli;
pub mod core;
pub mod format;
pub mod registry;
pub mod resource;
pub mod ui;
