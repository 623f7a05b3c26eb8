// src/commands/mod.rs
//! Command handlers for the `set` CLI

mod install;
mod key;
mod link;
mod query;
mod recipe;
mod remove;

pub use install::{cmd_install, InstallOptions};
pub use key::cmd_key_import;
pub use link::{cmd_link, cmd_unlink};
pub use query::cmd_list;
pub use recipe::cmd_check;
pub use remove::cmd_uninstall;

use anyhow::{Context, Result};
use setpm::filesystem::Linker;
use setpm::recipe::format::Phase;
use setpm::recipe::kitchen::OutputSink;
use setpm::{Config, Package};

/// Prints build output as it arrives
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn line(&self, phase: Phase, line: &str) {
        println!("  [{}] {}", phase, line);
    }
}

fn package(name: &str, version: &str) -> Result<Package> {
    Package::new(name, version).with_context(|| format!("Invalid package {}@{}", name, version))
}

fn linker(config: &Config) -> Linker {
    Linker::new(&config.prefix, &config.lock_dir)
}
