// src/commands/key.rs
//! Keyring management

use anyhow::{Context, Result};
use setpm::repository::GpgVerifier;
use setpm::Config;
use std::path::Path;

pub fn cmd_key_import(config: &Config, file: &Path) -> Result<()> {
    let verifier = GpgVerifier::new(&config.keyring);
    let fingerprint = verifier
        .import_key_from_file(file)
        .with_context(|| format!("Failed to import key from {}", file.display()))?;

    println!(
        "Trusted key {} (stored in {})",
        fingerprint,
        verifier.keyring_dir().display()
    );
    Ok(())
}
