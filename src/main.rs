// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::InstallOptions;
use setpm::cancel::install_signal_handlers;
use setpm::{CancelToken, Config};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(cellar) = cli.cellar {
        config.cellar = cellar;
    }
    if let Some(prefix) = cli.prefix {
        config.prefix = prefix;
    }
    config.absolutize()?;
    debug!("Cellar {}, prefix {}", config.cellar.display(), config.prefix.display());

    match cli.command {
        Commands::Install {
            recipe,
            link,
            reinstall,
            keep_going,
            keep_workspace,
            timeout,
        } => {
            install_signal_handlers()?;
            let options = InstallOptions {
                link,
                reinstall,
                keep_going,
                keep_workspace,
                timeout,
            };
            commands::cmd_install(&config, &recipe, options, CancelToken::new())
        }
        Commands::Uninstall { name, version } => commands::cmd_uninstall(&config, &name, &version),
        Commands::Link { name, version } => commands::cmd_link(&config, &name, &version),
        Commands::Unlink { name, version } => commands::cmd_unlink(&config, &name, &version),
        Commands::List => commands::cmd_list(&config),
        Commands::Check { recipe, print } => commands::cmd_check(&config, &recipe, print),
        Commands::KeyImport { file } => commands::cmd_key_import(&config, &file),
    }
}
