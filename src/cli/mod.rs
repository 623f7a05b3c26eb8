// src/cli/mod.rs
//! CLI definitions for `set`
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "set")]
#[command(author = "Set Contributors")]
#[command(version)]
#[command(about = "Source-based package manager with a cellar and a symlink farm", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/set/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cellar root, overriding the configuration
    #[arg(long, global = true, value_name = "DIR")]
    pub cellar: Option<PathBuf>,

    /// Shared prefix for links, overriding the configuration
    #[arg(long, global = true, value_name = "DIR")]
    pub prefix: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and install a package from a recipe
    Install {
        /// Recipe file path or name in the recipe index
        recipe: String,

        /// Link the installed files into the prefix
        #[arg(long)]
        link: bool,

        /// Replace an existing install of the same version
        #[arg(long)]
        reinstall: bool,

        /// Continue past failed build steps
        #[arg(long)]
        keep_going: bool,

        /// Keep the build workspace for inspection
        #[arg(long)]
        keep_workspace: bool,

        /// Kill build steps running longer than this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Unlink and remove an installed package
    Uninstall {
        name: String,
        version: String,
    },

    /// Link an installed package into the prefix
    Link {
        name: String,
        version: String,
    },

    /// Remove an installed package's links from the prefix
    Unlink {
        name: String,
        version: String,
    },

    /// List installed packages
    List,

    /// Parse and validate a recipe without building it
    Check {
        /// Recipe file path or name in the recipe index
        recipe: String,

        /// Print the recipe in canonical TOML form
        #[arg(long)]
        print: bool,
    },

    /// Trust an OpenPGP certificate for signature verification
    KeyImport {
        /// Certificate file (ASCII-armored or binary)
        file: PathBuf,
    },
}
