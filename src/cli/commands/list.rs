//! list command - List every program in a registry

use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::Context;
use crate::core::types::{ProgramIdentifier, SlotIndex};
use crate::ui::output;

#[derive(Serialize)]
struct ListEntry<'a> {
    #[serde(flatten)]
    id: &'a ProgramIdentifier,
    slot: SlotIndex,
}

/// Print every stored identifier, sorted.
pub fn list(ctx: &Context, registry: &Path, json: bool) -> Result<()> {
    let entries = ctx
        .reader(registry)
        .entries()
        .with_context(|| format!("Failed to read {}", registry.display()))?;

    if json {
        let rows: Vec<_> = entries
            .iter()
            .map(|(id, slot)| ListEntry { id, slot: *slot })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (id, slot) in &entries {
        println!("{}\t{}", id, slot);
    }
    output::debug(format!("{} programs", entries.len()), ctx.verbosity);
    Ok(())
}
