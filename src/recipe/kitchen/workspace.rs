// src/recipe/kitchen/workspace.rs

//! Scratch space for one pipeline run
//!
//! A [`Workspace`] is a uniquely named temporary directory holding the
//! downloaded artifact (`downloads/`) and the unpacked tree (`extract/`).
//! It is backed by [`tempfile::TempDir`], so dropping it on any exit path,
//! including an unwinding panic, removes the whole tree.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `parent`
    pub fn create(parent: &Path) -> Result<Self> {
        fs::create_dir_all(parent).map_err(|e| {
            Error::IoError(format!(
                "Failed to create work directory {}: {}",
                parent.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix("set-")
            .tempdir_in(parent)
            .map_err(|e| Error::IoError(format!("Failed to create workspace: {}", e)))?;

        let workspace = Self { dir };
        fs::create_dir_all(workspace.downloads_dir())?;
        debug!("Created workspace {}", workspace.root().display());
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Where fetched artifacts and signatures land
    pub fn downloads_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    /// Where archives are unpacked
    pub fn extract_dir(&self) -> PathBuf {
        self.dir.path().join("extract")
    }

    /// Remove the workspace now, reporting any error
    pub fn close(self) -> Result<()> {
        let path = self.root().to_path_buf();
        self.dir.close().map_err(|e| {
            Error::IoError(format!("Failed to remove workspace {}: {}", path.display(), e))
        })?;
        debug!("Removed workspace {}", path.display());
        Ok(())
    }

    /// Keep the workspace on disk and return its path
    pub fn keep(self) -> PathBuf {
        let path = self.dir.keep();
        info!("Kept workspace at {}", path.display());
        path
    }
}
