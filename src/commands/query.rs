// src/commands/query.rs
//! Queries over the cellar

use anyhow::{Context, Result};
use setpm::{Cellar, Config};

/// Print every installed package, one per line
pub fn cmd_list(config: &Config) -> Result<()> {
    let cellar = Cellar::new(&config.cellar);
    let packages = cellar
        .list()
        .with_context(|| format!("Failed to list {}", cellar.root().display()))?;

    if packages.is_empty() {
        println!("No packages installed in {}", cellar.root().display());
        return Ok(());
    }

    for package in &packages {
        println!("{}", package);
    }
    Ok(())
}
