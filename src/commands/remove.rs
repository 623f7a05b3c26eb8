// src/commands/remove.rs
//! Package removal

use super::{linker, package};
use anyhow::{Context, Result};
use setpm::{Cellar, Config, ErrorKind};
use tracing::{debug, info};

/// Unlink a package from the prefix, then delete its cellar entry
pub fn cmd_uninstall(config: &Config, name: &str, version: &str) -> Result<()> {
    let package = package(name, version)?;
    let cellar = Cellar::new(&config.cellar);
    let install_dir = cellar.install_dir(&package);

    match linker(config).unlink(&install_dir) {
        Ok(report) => debug!("Removed {} links", report.removed.len()),
        // nothing to unlink; uninstall reports the missing package below
        Err(e) if e.kind() == ErrorKind::NotInstalled => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to unlink {}", package));
        }
    }

    cellar
        .uninstall(&package)
        .with_context(|| format!("Failed to uninstall {}", package))?;

    println!("Uninstalled {}", package);
    info!("Uninstalled {} from {}", package, cellar.root().display());
    Ok(())
}
