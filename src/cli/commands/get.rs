//! get command - Fetch one program from a registry

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};

use super::Context;
use crate::core::types::ProgramIdentifier;
use crate::ui::output;

/// Load `(path, name)` from the registry at `registry` and write it to
/// `out`, or stdout.
pub fn get(
    ctx: &Context,
    registry: &Path,
    path: &str,
    name: &str,
    out: Option<&Path>,
) -> Result<()> {
    let id = ProgramIdentifier::new(path, name).context("Invalid program identifier")?;
    let binary = ctx
        .reader(registry)
        .load_program(&id)
        .with_context(|| format!("Failed to load from {}", registry.display()))?;

    match out {
        Some(file) => {
            fs::write(file, binary.bytes())
                .with_context(|| format!("Failed to write {}", file.display()))?;
            output::success(
                format!(
                    "Wrote {} ({} bytes, {}) to {}",
                    id,
                    binary.len(),
                    binary.format(),
                    file.display()
                ),
                ctx.verbosity,
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(binary.bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
