// src/recipe/kitchen/mod.rs

//! Kitchen: runs one recipe from download to cellar
//!
//! The pipeline is strictly linear:
//!
//! ```text
//! Created -> Fetched -> Verified -> Extracted -> Configured -> Built -> Installed -> Done
//! ```
//!
//! Any stage may fail, which ends the run with a [`PipelineError`] naming the
//! stage that was being attempted. The [`Workspace`] holding the download and
//! the unpacked tree lives exactly as long as [`Kitchen::run`] and is removed
//! on every exit path. The install directory is created fresh after
//! extraction; if anything after that fails it is removed again, so a failed
//! run never leaves a cellar entry behind.
//!
//! Reinstalling wipes the old install directory. When that tree is linked
//! into a prefix, give the kitchen the prefix's [`Linker`] with
//! [`Kitchen::with_linker`]: the old links are removed before the wipe and
//! recreated for the new tree once it is installed.

mod archive;
mod config;
mod cook;
mod fetch;
mod verify;
mod workspace;

pub use archive::{detect_format, extract, package_dir, ArchiveFormat};
pub use config::{default_jobs, CookResult, KitchenConfig};
pub use cook::{BuildReport, Builder, FailurePolicy, LogSink, OutputSink, StepResult};
pub use fetch::{strategy, DownloadStrategy, Fetcher};
pub use verify::{ChecksumVerify, SignatureVerify, Verifier, VerifyStrategy};
pub use workspace::Workspace;

use crate::cancel::CancelToken;
use crate::error::{Error, ErrorKind};
use crate::filesystem::{Cellar, Linker};
use crate::recipe::format::{Package, Phase, Recipe};
use crate::repository::HttpClient;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pipeline states, in the order they are reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Created,
    Fetched,
    Verified,
    Extracted,
    Configured,
    Built,
    Installed,
    Done,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Fetched => "fetched",
            Self::Verified => "verified",
            Self::Extracted => "extracted",
            Self::Configured => "configured",
            Self::Built => "built",
            Self::Installed => "installed",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Phase> for Stage {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Configure => Self::Configured,
            Phase::Build => Self::Built,
            Phase::Install => Self::Installed,
        }
    }
}

/// A run that ended in the failed state
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    /// The stage that was being attempted
    pub stage: Stage,
    pub source: Error,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

fn at(stage: Stage) -> impl Fn(Error) -> PipelineError {
    move |source| PipelineError { stage, source }
}

/// Removes a partially written install directory unless disarmed
struct InstallGuard<'a> {
    cellar: &'a Cellar,
    package: &'a Package,
    armed: bool,
}

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Removing incomplete install of {}", self.package);
            if let Err(e) = self.cellar.uninstall(self.package) {
                warn!("Failed to clean up install directory: {}", e);
            }
        }
    }
}

/// The Kitchen: where recipes are cooked
pub struct Kitchen {
    config: KitchenConfig,
    cellar: Cellar,
    client: Arc<dyn HttpClient>,
    sink: Arc<dyn OutputSink>,
    cancel: CancelToken,
    linker: Option<Linker>,
}

impl Kitchen {
    pub fn new(config: KitchenConfig, client: Arc<dyn HttpClient>) -> Self {
        let cellar = Cellar::new(&config.cellar);
        Self {
            config,
            cellar,
            client,
            sink: Arc::new(LogSink),
            cancel: CancelToken::new(),
            linker: None,
        }
    }

    /// Send build output somewhere other than the log
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Keep this prefix free of dangling links when replacing an install
    pub fn with_linker(mut self, linker: Linker) -> Self {
        self.linker = Some(linker);
        self
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    pub fn cellar(&self) -> &Cellar {
        &self.cellar
    }

    /// Fetch, verify, extract and build `recipe` into its cellar directory
    pub fn run(&self, recipe: &Recipe) -> std::result::Result<CookResult, PipelineError> {
        let package = &recipe.package;
        info!("Cooking {}", package);

        if self.cellar.is_installed(package) {
            if !self.config.reinstall {
                return Err(at(Stage::Created)(Error::AlreadyInstalled(package.slug())));
            }
            info!("{} is installed, replacing it", package);
        }

        let workspace = Workspace::create(&self.config.work_dir).map_err(at(Stage::Created))?;
        let mut stages = vec![Stage::Created];
        let mut warnings = Vec::new();

        let outcome = self.cook(recipe, &workspace, &mut stages);

        if self.config.keep_workspace {
            let kept = workspace.keep();
            warnings.push(format!("workspace kept at {}", kept.display()));
        } else if let Err(e) = workspace.close() {
            warn!("{}", e);
        }

        let (install_dir, build) = outcome?;
        warnings.extend(build.warnings.iter().cloned());
        stages.push(Stage::Done);
        info!("Installed {} to {}", package, install_dir.display());

        Ok(CookResult {
            package: package.clone(),
            install_dir,
            stages,
            build,
            warnings,
        })
    }

    fn cook(
        &self,
        recipe: &Recipe,
        workspace: &Workspace,
        stages: &mut Vec<Stage>,
    ) -> std::result::Result<(PathBuf, BuildReport), PipelineError> {
        let client = &*self.client;
        let cancel = &self.cancel;

        cancel.check().map_err(at(Stage::Fetched))?;
        let artifact = Fetcher::new(client, cancel, self.config.progress)
            .fetch(&recipe.download, workspace)
            .map_err(at(Stage::Fetched))?;
        stages.push(Stage::Fetched);

        cancel.check().map_err(at(Stage::Verified))?;
        Verifier::new(client, &self.config.keyring, cancel)
            .verify(&artifact, recipe.download.verify(), workspace)
            .map_err(at(Stage::Verified))?;
        stages.push(Stage::Verified);

        cancel.check().map_err(at(Stage::Extracted))?;
        let package_dir = extract(&artifact, workspace).map_err(at(Stage::Extracted))?;
        stages.push(Stage::Extracted);
        debug!("Package directory: {}", package_dir.display());

        cancel.check().map_err(at(Stage::Configured))?;
        let relink = self.unlink_previous(&recipe.package).map_err(at(Stage::Configured))?;
        let install_dir = self
            .cellar
            .prepare(&recipe.package)
            .map_err(at(Stage::Configured))?;
        let mut guard = InstallGuard {
            cellar: &self.cellar,
            package: &recipe.package,
            armed: true,
        };

        let policy = if recipe.build.keep_going || self.config.keep_going {
            FailurePolicy::KeepGoing
        } else {
            FailurePolicy::FailFast
        };
        let builder = Builder {
            recipe,
            package_dir: &package_dir,
            install_dir: &install_dir,
            jobs: self.config.jobs.max(1),
            timeout: self.config.timeout,
            policy,
            sink: &*self.sink,
            cancel,
        };

        let mut report = BuildReport::default();
        for phase in Phase::ALL {
            let stage = Stage::from(phase);
            cancel.check().map_err(at(stage))?;
            builder.run_phase(phase, &mut report).map_err(at(stage))?;
            stages.push(stage);
        }

        if !self.cellar.is_installed(&recipe.package) {
            return Err(at(Stage::Installed)(Error::EmptyInstall(install_dir)));
        }

        guard.armed = false;

        if let Some(linker) = relink {
            linker.link(&install_dir).map_err(at(Stage::Installed))?;
        }
        Ok((install_dir, report))
    }

    /// Unlink a linked install that is about to be replaced
    ///
    /// Returns the linker to relink with once the new tree is in place.
    fn unlink_previous(&self, package: &Package) -> crate::error::Result<Option<&Linker>> {
        let Some(linker) = &self.linker else {
            return Ok(None);
        };
        let install_dir = self.cellar.install_dir(package);
        if !install_dir.is_dir() || !linker.is_linked(&install_dir)? {
            return Ok(None);
        }
        info!("Unlinking {} from {} before replacing it", package, linker.prefix().display());
        linker.unlink(&install_dir)?;
        Ok(Some(linker))
    }
}

/// Convenience for callers that do not care which stage failed
impl From<PipelineError> for Error {
    fn from(e: PipelineError) -> Self {
        e.source
    }
}
