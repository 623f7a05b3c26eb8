// src/recipe/format.rs

//! Recipe data model
//!
//! These are the validated, strongly-typed forms of a recipe document. They
//! are only ever produced by [`crate::recipe::parser`], so code holding a
//! [`Recipe`] can rely on every invariant checked there: non-empty package
//! identity, exactly one download variant, at most one verification method
//! and sanitized working directories.

use crate::filesystem::path::sanitize_filename;
use crate::hash::Hash;
use std::fmt;
use std::path::{Path, PathBuf};

/// A malformed recipe document
///
/// `context` names the enclosing block (`package`, `download`,
/// `download.verify`, `build.configure`, ...) and `field` the key inside it,
/// so the message reads like `package.name: missing`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{context}.{field}: {message}")]
pub struct ValidationError {
    pub context: String,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        context: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// A required key is absent
    pub fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(context, field, "missing")
    }
}

/// Package identity
///
/// Immutable once built. Both parts end up as directory names in the cellar,
/// so each must be a single non-empty path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Package {
    name: String,
    version: String,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> std::result::Result<Self, ValidationError> {
        let name = name.into();
        let version = version.into();
        check_component("name", &name)?;
        check_component("version", &version)?;
        Ok(Self { name, version })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Human-readable identifier, `name@version`
    pub fn slug(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// On-disk identifier, `name/version`
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.name).join(&self.version)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

fn check_component(field: &str, value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("package", field, "must not be empty"));
    }
    sanitize_filename(value)
        .map(|_| ())
        .map_err(|e| ValidationError::new("package", field, e.to_string()))
}

/// How the source artifact's integrity is established
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifySpec {
    /// Hex digest of the artifact
    Checksum(Hash),
    /// URL of a detached OpenPGP signature over the artifact
    Signature { url: String },
}

/// A plain artifact URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlDownload {
    pub url: String,
    pub verify: Option<VerifySpec>,
}

/// A repository plus a branch or tag, fetched as that ref's tarball
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRefDownload {
    pub url: String,
    pub reference: String,
    pub verify: Option<VerifySpec>,
}

/// Where the source comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSpec {
    Url(UrlDownload),
    SourceRef(SourceRefDownload),
}

impl DownloadSpec {
    /// URL as written in the recipe
    pub fn url(&self) -> &str {
        match self {
            Self::Url(d) => &d.url,
            Self::SourceRef(d) => &d.url,
        }
    }

    pub fn verify(&self) -> Option<&VerifySpec> {
        match self {
            Self::Url(d) => d.verify.as_ref(),
            Self::SourceRef(d) => d.verify.as_ref(),
        }
    }
}

/// Build phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Configure,
    Build,
    Install,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Configure, Phase::Build, Phase::Install];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Install => "install",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered shell step templates for one phase
///
/// An empty group means the phase is skipped without spawning anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepGroup {
    /// Working directory relative to the package directory
    pub dir: Option<PathBuf>,
    pub steps: Vec<String>,
}

impl StepGroup {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Build instructions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSpec {
    pub configure: StepGroup,
    pub build: StepGroup,
    pub install: StepGroup,
    /// Continue past failed steps instead of aborting
    pub keep_going: bool,
}

impl BuildSpec {
    pub fn group(&self, phase: Phase) -> &StepGroup {
        match phase {
            Phase::Configure => &self.configure,
            Phase::Build => &self.build,
            Phase::Install => &self.install,
        }
    }

    /// True when no phase has any step
    pub fn is_empty(&self) -> bool {
        Phase::ALL.iter().all(|p| self.group(*p).is_empty())
    }
}

/// Values substituted into step templates
#[derive(Debug, Clone)]
pub struct StepContext<'a> {
    pub prefix: &'a Path,
    pub srcdir: &'a Path,
    pub jobs: usize,
}

/// A validated recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub package: Package,
    pub download: DownloadSpec,
    pub build: BuildSpec,
}

impl Recipe {
    /// Substitute placeholders in a step template
    ///
    /// Recognized: `{prefix}`, `{srcdir}`, `{name}`, `{version}`, `{jobs}`.
    /// Anything else in braces is left alone so shell syntax like `${VAR}`
    /// passes through untouched.
    pub fn substitute(&self, template: &str, ctx: &StepContext<'_>) -> String {
        template
            .replace("{prefix}", &ctx.prefix.to_string_lossy())
            .replace("{srcdir}", &ctx.srcdir.to_string_lossy())
            .replace("{name}", self.package.name())
            .replace("{version}", self.package.version())
            .replace("{jobs}", &ctx.jobs.to_string())
    }
}
