// src/filesystem/cellar.rs

//! The cellar: one isolated directory per installed (name, version)
//!
//! Nothing about an install is recorded outside its directory. A package is
//! installed exactly when `<root>/<name>/<version>` exists and is non-empty.

use crate::error::{Error, Result};
use crate::recipe::format::Package;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Cellar {
    root: PathBuf,
}

impl Cellar {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<name>/<version>`
    pub fn install_dir(&self, package: &Package) -> PathBuf {
        self.root.join(package.relative_path())
    }

    pub fn is_installed(&self, package: &Package) -> bool {
        fs::read_dir(self.install_dir(package))
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Create an empty install directory, clearing anything already there
    pub fn prepare(&self, package: &Package) -> Result<PathBuf> {
        let dir = self.install_dir(package);
        if dir.exists() {
            debug!("Clearing stale install directory {}", dir.display());
            fs::remove_dir_all(&dir).map_err(|e| {
                Error::IoError(format!("Failed to remove {}: {}", dir.display(), e))
            })?;
        }
        fs::create_dir_all(&dir)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {}", dir.display(), e)))?;
        Ok(dir)
    }

    /// Remove a package's install directory
    pub fn uninstall(&self, package: &Package) -> Result<()> {
        let dir = self.install_dir(package);
        if !dir.exists() {
            return Err(Error::NotInstalled(package.slug()));
        }

        fs::remove_dir_all(&dir)
            .map_err(|e| Error::IoError(format!("Failed to remove {}: {}", dir.display(), e)))?;

        // Drop the name directory once its last version is gone
        if let Some(name_dir) = dir.parent()
            && fs::read_dir(name_dir).is_ok_and(|mut entries| entries.next().is_none())
            && let Err(e) = fs::remove_dir(name_dir)
        {
            warn!("Failed to remove {}: {}", name_dir.display(), e);
        }

        info!("Uninstalled {}", package);
        Ok(())
    }

    /// Every installed package, sorted by name then version
    pub fn list(&self) -> Result<Vec<Package>> {
        let mut packages = Vec::new();
        let names = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(packages),
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to read cellar {}: {}",
                    self.root.display(),
                    e
                )));
            }
        };

        for name_entry in names {
            let name_entry = name_entry?;
            if !name_entry.file_type()?.is_dir() {
                continue;
            }
            let name = name_entry.file_name().to_string_lossy().into_owned();

            for version_entry in fs::read_dir(name_entry.path())? {
                let version_entry = version_entry?;
                if !version_entry.file_type()?.is_dir() {
                    continue;
                }
                let version = version_entry.file_name().to_string_lossy().into_owned();
                match Package::new(&name, &version) {
                    Ok(package) if self.is_installed(&package) => packages.push(package),
                    Ok(_) => {}
                    Err(e) => debug!("Skipping {}/{}: {}", name, version, e),
                }
            }
        }

        packages.sort();
        Ok(packages)
    }
}
