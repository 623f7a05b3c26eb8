// src/commands/link.rs
//! Symlink farm commands

use super::{linker, package};
use anyhow::{Context, Result};
use setpm::{Cellar, Config};

pub fn cmd_link(config: &Config, name: &str, version: &str) -> Result<()> {
    let package = package(name, version)?;
    let install_dir = Cellar::new(&config.cellar).install_dir(&package);

    let report = linker(config)
        .link(&install_dir)
        .with_context(|| format!("Failed to link {}", package))?;

    for conflict in &report.conflicts {
        println!("[WARNING] replaced foreign file {}", conflict.display());
    }
    println!(
        "Linked {} files of {} into {}",
        report.linked.len(),
        package,
        config.prefix.display()
    );
    Ok(())
}

pub fn cmd_unlink(config: &Config, name: &str, version: &str) -> Result<()> {
    let package = package(name, version)?;
    let install_dir = Cellar::new(&config.cellar).install_dir(&package);

    let report = linker(config)
        .unlink(&install_dir)
        .with_context(|| format!("Failed to unlink {}", package))?;

    println!(
        "Removed {} links of {} from {}",
        report.removed.len(),
        package,
        config.prefix.display()
    );
    Ok(())
}
