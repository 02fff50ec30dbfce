//! verify command - Check a registry end to end

use std::path::Path;

use anyhow::{Context as _, Result};

use super::Context;
use crate::ui::output;

/// Resolve every identifier and load every binary in `registry`.
pub fn verify(ctx: &Context, registry: &Path, json: bool) -> Result<()> {
    let report = ctx
        .reader(registry)
        .verify()
        .with_context(|| format!("Registry at {} failed verification", registry.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !report.is_compact() {
        output::warn(
            format!(
                "{} binaries are not referenced by any program",
                report.unreferenced_slots.len()
            ),
            ctx.verbosity,
        );
        output::debug(
            output::format_list(&report.unreferenced_slots, "unreferenced slot "),
            ctx.verbosity,
        );
    }
    output::success(
        format!(
            "OK: {} programs, {} binaries ({} shared), {} bytes checked",
            report.identifiers, report.binaries, report.shared_slots, report.bytes_checked
        ),
        ctx.verbosity,
    );
    Ok(())
}
