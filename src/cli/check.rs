//! `check-config` command

use crate::config::load_config;
use anyhow::{Context, Result};

pub fn run() -> Result<()> {
    let config = load_config()?;
    config.validate()?;

    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{rendered}");
    println!("✅ Configuration is valid");
    Ok(())
}
