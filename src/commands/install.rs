// src/commands/install.rs
//! Build a recipe into the cellar

use super::{linker, StdoutSink};
use anyhow::{Context, Result};
use setpm::recipe::RecipeSource;
use setpm::repository::RepositoryClient;
use setpm::{CancelToken, Config, Kitchen};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Options of `set install`
#[derive(Debug, Default)]
pub struct InstallOptions {
    pub link: bool,
    pub reinstall: bool,
    pub keep_going: bool,
    pub keep_workspace: bool,
    pub timeout: Option<u64>,
}

pub fn cmd_install(
    config: &Config,
    recipe: &str,
    options: InstallOptions,
    cancel: CancelToken,
) -> Result<()> {
    let client = Arc::new(RepositoryClient::new()?.with_cancel(cancel.clone()));
    let recipe = RecipeSource::new(config.recipe_index.clone(), client.as_ref())
        .resolve(recipe)
        .with_context(|| format!("Failed to load recipe {}", recipe))?;

    let mut kitchen_config = config.kitchen_config();
    kitchen_config.reinstall = options.reinstall;
    kitchen_config.keep_going = options.keep_going;
    kitchen_config.keep_workspace = options.keep_workspace;
    kitchen_config.progress = true;
    if let Some(secs) = options.timeout {
        kitchen_config.timeout = Some(Duration::from_secs(secs));
    }

    println!("Cooking {} with {} parallel jobs...", recipe.package, kitchen_config.jobs);
    let kitchen = Kitchen::new(kitchen_config, client)
        .with_sink(Arc::new(StdoutSink))
        .with_cancel(cancel)
        .with_linker(linker(config));

    let result = kitchen
        .run(&recipe)
        .with_context(|| format!("Failed to install {}", recipe.package))?;

    println!(
        "\n[COMPLETE] Installed {} to {}",
        result.package,
        result.install_dir.display()
    );

    if !result.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }

    if options.link {
        let report = linker(config)
            .link(&result.install_dir)
            .with_context(|| format!("Failed to link {}", result.package))?;
        for conflict in &report.conflicts {
            println!("[WARNING] replaced foreign file {}", conflict.display());
        }
        println!(
            "Linked {} files into {}",
            report.linked.len(),
            config.prefix.display()
        );
    }

    info!("Installed {}", result.package);
    Ok(())
}
