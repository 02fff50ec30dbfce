//! stats command - Show registry sizes

use std::path::Path;

use anyhow::{Context as _, Result};

use super::Context;
use crate::ui::output;

/// Print node, binary and page counts of the registry at `registry`.
pub fn stats(ctx: &Context, registry: &Path, json: bool) -> Result<()> {
    let stats = ctx
        .reader(registry)
        .stats()
        .with_context(|| format!("Failed to read {}", registry.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Registry: {}", registry.display());
    println!("  index nodes:   {}", stats.nodes);
    println!("  binaries:      {}", stats.binaries);
    println!(
        "  payload:       {} ({})",
        stats.payload_bytes,
        output::format_bytes(stats.payload_bytes)
    );
    println!("  index pages:   {}", stats.index_pages);
    println!("  binary pages:  {}", stats.binary_pages);
    Ok(())
}
