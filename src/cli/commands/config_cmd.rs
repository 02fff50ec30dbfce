//! config command - Show or create the configuration file

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use super::Context;
use crate::core::config::{Config, ReaderConfig, RegistryConfig, WriterConfig};
use crate::ui::output;

/// Show the effective configuration.
pub fn show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    match config.source_path() {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# No config file found; using defaults"),
    }
    println!("reader.index_page_log2 = {}", config.index_page_log2());
    println!("reader.binary_page_log2 = {}", config.binary_page_log2());
    println!("writer.sync = {}", config.sync_on_write());
    Ok(())
}

/// Write a config file spelling out the defaults.
pub fn init(ctx: &Context, path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path().context("Cannot determine config location")?,
    };
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let defaults = Config::default();
    let file = RegistryConfig {
        reader: Some(ReaderConfig {
            index_page_log2: Some(defaults.index_page_log2()),
            binary_page_log2: Some(defaults.binary_page_log2()),
        }),
        writer: Some(WriterConfig {
            sync: Some(defaults.sync_on_write()),
        }),
    };
    Config::write_to(&path, &file).context("Failed to write config")?;

    output::success(format!("Wrote {}", path.display()), ctx.verbosity);
    Ok(())
}
