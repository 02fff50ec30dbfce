//! ui::output
//!
//! Human-facing messages for the registry commands.
//!
//! Results go to stdout, diagnostics to stderr. `--quiet` silences
//! everything except errors. Commands that take `--json` write JSON to
//! stdout directly and only use this module for diagnostics.

use std::fmt::Display;

/// How much the CLI says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    Normal,
    /// Per-program detail on stderr.
    Debug,
}

impl Verbosity {
    /// `--quiet` wins over `--debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        match (quiet, debug) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Debug,
            (false, false) => Verbosity::Normal,
        }
    }

    fn speaks(self) -> bool {
        self != Verbosity::Quiet
    }
}

/// Per-program detail, shown with `--debug`.
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Fatal error. Shown even with `--quiet`.
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity.speaks() {
        eprintln!("warning: {}", message);
    }
}

/// Final result line of a command.
pub fn success(message: impl Display, verbosity: Verbosity) {
    if verbosity.speaks() {
        println!("{}", message);
    }
}

/// One `prefix item` line per item.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte count in binary units, e.g. `512 B` or `1.5 KiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
