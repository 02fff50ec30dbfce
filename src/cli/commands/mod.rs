//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Opens a registry writer or reader
//! 3. Formats and displays output through [`crate::ui::output`]
//!
//! Handlers never touch artifact bytes themselves.

mod completion;
mod config_cmd;
mod get;
mod list;
mod pack;
mod stats;
mod verify;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use config_cmd::{init as config_init, show as config_show};
pub use get::get;
pub use list::list;
pub use pack::{identifier_for, pack};
pub use stats::stats;
pub use verify::verify;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::cli::args::{Command, ConfigAction};
use crate::core::config::Config;
use crate::registry::BinaryRegistryReader;
use crate::resource::DirArchive;
use crate::ui::output::Verbosity;

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub verbosity: Verbosity,
}

impl Context {
    /// Reader over the registry directory `dir`, tuned by the config.
    pub fn reader(&self, dir: &Path) -> BinaryRegistryReader {
        BinaryRegistryReader::with_config(Arc::new(DirArchive::new(dir)), "", &self.config)
    }
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Pack { src, dst, json } => pack::pack(ctx, &src, &dst, json),
        Command::Get {
            registry,
            path,
            name,
            output,
        } => get::get(ctx, &registry, &path, &name, output.as_deref()),
        Command::List { registry, json } => list::list(ctx, &registry, json),
        Command::Stats { registry, json } => stats::stats(ctx, &registry, json),
        Command::Verify { registry, json } => verify::verify(ctx, &registry, json),
        Command::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(ctx),
            ConfigAction::Init { path, force } => config_cmd::init(ctx, path.as_deref(), force),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}
