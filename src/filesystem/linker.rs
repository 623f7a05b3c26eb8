// src/filesystem/linker.rs

//! Symlink farm: project a cellar install into a shared prefix
//!
//! The link set of an install directory is every non-directory entry below
//! it, keyed by its path relative to the install directory. `link` mirrors
//! that set into the prefix as absolute symlinks; `unlink` removes whatever
//! sits at the same relative paths. Directories are created as needed and
//! never removed.
//!
//! Concurrent link/unlink runs against one prefix are serialized with an
//! exclusive file lock kept outside the prefix.

use crate::error::{Error, Result};
use crate::hash::sha256;
use fs2::FileExt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of [`Linker::link`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Relative paths that now point into the cellar
    pub linked: Vec<PathBuf>,
    /// Relative paths where a foreign file was replaced
    pub conflicts: Vec<PathBuf>,
}

/// Outcome of [`Linker::unlink`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlinkReport {
    pub removed: Vec<PathBuf>,
}

/// Exclusive lock on one prefix, released on drop
struct PrefixLock {
    #[allow(dead_code)]
    file: File,
}

impl PrefixLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        file.lock_exclusive().map_err(|e| {
            Error::IoError(format!("Failed to lock {}: {}", path.display(), e))
        })?;
        debug!("Acquired link lock {}", path.display());
        Ok(Self { file })
    }
}

#[derive(Debug, Clone)]
pub struct Linker {
    prefix: PathBuf,
    lock_dir: PathBuf,
}

impl Linker {
    pub fn new(prefix: impl Into<PathBuf>, lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            lock_dir: lock_dir.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// `<lock_dir>/set-link-<first 16 hex digits of sha256(prefix)>.lock`
    ///
    /// The prefix is made absolute and rebuilt from its components first, so
    /// `/opt/p`, `/opt/p/` and `/opt/./p` share one lock.
    pub fn lock_path(&self) -> PathBuf {
        let absolute = std::path::absolute(&self.prefix).unwrap_or_else(|_| self.prefix.clone());
        let normalized: PathBuf = absolute.components().collect();
        let digest = sha256(normalized.as_os_str().as_encoded_bytes());
        self.lock_dir.join(format!("set-link-{}.lock", &digest[..16]))
    }

    /// Whether any prefix entry is a symlink into `install_dir`
    pub fn is_linked(&self, install_dir: &Path) -> Result<bool> {
        let source_root = std::path::absolute(install_dir)?;
        for relative in link_set(&source_root)? {
            if let Ok(target) = fs::read_link(self.prefix.join(&relative))
                && target == source_root.join(&relative)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Symlink every file of `install_dir` into the prefix
    pub fn link(&self, install_dir: &Path) -> Result<LinkReport> {
        let _lock = PrefixLock::acquire(&self.lock_path())?;
        let source_root = std::path::absolute(install_dir)?;
        let files = link_set(&source_root)?;

        let mut report = LinkReport::default();
        for relative in files {
            let source = source_root.join(&relative);
            let dest = self.prefix.join(&relative);

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::IoError(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }

            match fs::symlink_metadata(&dest) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    fs::remove_file(&dest)?;
                }
                Ok(meta) if meta.is_dir() => {
                    return Err(Error::LinkConflict { path: dest });
                }
                Ok(_) => {
                    warn!("{} exists and is not a symlink, replacing it", dest.display());
                    report.conflicts.push(relative.clone());
                    fs::remove_file(&dest)?;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::IoError(format!(
                        "Failed to inspect {}: {}",
                        dest.display(),
                        e
                    )));
                }
            }

            std::os::unix::fs::symlink(&source, &dest).map_err(|e| {
                Error::IoError(format!(
                    "Failed to link {} -> {}: {}",
                    dest.display(),
                    source.display(),
                    e
                ))
            })?;
            report.linked.push(relative);
        }

        info!(
            "Linked {} files into {} ({} conflicts)",
            report.linked.len(),
            self.prefix.display(),
            report.conflicts.len()
        );
        Ok(report)
    }

    /// Remove the prefix entries matching `install_dir`'s files
    pub fn unlink(&self, install_dir: &Path) -> Result<UnlinkReport> {
        let _lock = PrefixLock::acquire(&self.lock_path())?;
        let files = link_set(install_dir)?;

        let mut report = UnlinkReport::default();
        for relative in files {
            let dest = self.prefix.join(&relative);
            match fs::symlink_metadata(&dest) {
                Ok(meta) if meta.is_dir() => {
                    debug!("Leaving directory {} in place", dest.display());
                }
                Ok(_) => {
                    fs::remove_file(&dest)?;
                    report.removed.push(relative);
                }
                Err(_) => {}
            }
        }

        info!(
            "Removed {} links from {}",
            report.removed.len(),
            self.prefix.display()
        );
        Ok(report)
    }
}

/// Relative paths of every non-directory entry under `install_dir`
pub fn link_set(install_dir: &Path) -> Result<Vec<PathBuf>> {
    if !install_dir.is_dir() {
        return Err(Error::NotInstalled(install_dir.display().to_string()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(install_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::IoError(format!("Failed to walk {}: {}", install_dir.display(), e))
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(install_dir) {
            files.push(relative.to_path_buf());
        }
    }
    Ok(files)
}
