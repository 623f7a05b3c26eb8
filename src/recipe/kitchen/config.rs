// src/recipe/kitchen/config.rs

//! Configuration and result types for the Kitchen

use super::cook::BuildReport;
use super::Stage;
use crate::recipe::format::Package;
use std::path::PathBuf;
use std::time::Duration;

/// Kitchen configuration
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Root of the cellar install directories are placed in
    pub cellar: PathBuf,
    /// Parent directory for per-run workspaces
    pub work_dir: PathBuf,
    /// Directory of trusted OpenPGP certificates
    pub keyring: PathBuf,
    /// Value of `{jobs}` and `MAKEFLAGS`
    pub jobs: usize,
    /// Per-step timeout (None = wait forever)
    pub timeout: Option<Duration>,
    /// Continue past failed steps for every recipe
    pub keep_going: bool,
    /// Leave the workspace on disk after the run
    pub keep_workspace: bool,
    /// Replace an existing install instead of refusing
    pub reinstall: bool,
    /// Show a download progress bar
    pub progress: bool,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            cellar: tmp.join("set-cellar"),
            work_dir: tmp.clone(),
            keyring: tmp.join("set-keys"),
            jobs: default_jobs(),
            timeout: None,
            keep_going: false,
            keep_workspace: false,
            reinstall: false,
            progress: false,
        }
    }
}

impl KitchenConfig {
    /// Default configuration installing into `cellar`
    pub fn new(cellar: impl Into<PathBuf>) -> Self {
        Self {
            cellar: cellar.into(),
            ..Self::default()
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_keyring(mut self, dir: impl Into<PathBuf>) -> Self {
        self.keyring = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Available parallelism, or 1 when it cannot be determined
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Result of a successful pipeline run
#[derive(Debug, Clone)]
pub struct CookResult {
    pub package: Package,
    /// Populated cellar directory
    pub install_dir: PathBuf,
    /// States visited, ending in [`Stage::Done`]
    pub stages: Vec<Stage>,
    pub build: BuildReport,
    /// Non-fatal problems (failed steps under keep-going, kept workspace)
    pub warnings: Vec<String>,
}
