// src/recipe/parser.rs

//! Recipe document parsing and validation
//!
//! A recipe is first deserialized into loose "document" structs where every
//! key is optional, then validated into [`Recipe`]. Keeping the two apart
//! means a missing key is reported as `package.name: missing` instead of a
//! serde error about a struct field, and validation runs exactly once, before
//! any I/O.
//!
//! Both TOML and YAML encode the same schema:
//!
//! ```toml
//! [package]
//! name = "foo"
//! version = "1.0"
//!
//! [download]
//! url = "https://example.test/foo-1.0.tar.gz"
//!
//! [download.verify]
//! sha512 = "..."
//!
//! [build]
//! configure = { cmd = "./configure" }
//! build = {}
//! install = {}
//! ```

use crate::error::{Error, Result};
use crate::filesystem::path::sanitize_path;
use crate::hash::{Hash, HashAlgorithm};
use crate::recipe::format::{
    BuildSpec, DownloadSpec, Package, Phase, Recipe, SourceRefDownload, StepGroup, UrlDownload,
    ValidationError, VerifySpec,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

type Validated<T> = std::result::Result<T, ValidationError>;

/// Default branch or tag for source-ref downloads
pub const DEFAULT_REF: &str = "main";

/// Serialization of a recipe document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeFormat {
    Toml,
    Yaml,
}

impl RecipeFormat {
    /// Pick the format from a file extension, if it names one
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    package: Option<PackageDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    download: Option<DownloadDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build: Option<BuildDocument>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DownloadDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repo: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verify: Option<VerifyDocument>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerifyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sha512: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sign: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keep_going: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    configure: Option<PhaseDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build: Option<PhaseDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    install: Option<PhaseDocument>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PhaseDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    steps: Option<Vec<String>>,
}

/// Parse recipe bytes of unknown encoding
///
/// TOML is tried first, then YAML. When neither decodes, the error of the
/// format the document looks like is reported.
pub fn parse_recipe(bytes: &[u8]) -> Result<Recipe> {
    let content = decode_utf8(bytes)?;
    let doc = match toml::from_str::<RecipeDocument>(content) {
        Ok(doc) => doc,
        Err(toml_err) => match serde_yaml::from_str::<RecipeDocument>(content) {
            Ok(doc) => doc,
            Err(yaml_err) if !looks_like_toml(content) => {
                return Err(syntax_error(&yaml_err.to_string()));
            }
            Err(_) => return Err(syntax_error(toml_err.message())),
        },
    };
    Ok(validate(doc)?)
}

/// First significant line is a `[table]` header or a `key = value` pair
fn looks_like_toml(content: &str) -> bool {
    let Some(line) = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
    else {
        return true;
    };
    if line.starts_with('[') {
        return true;
    }
    match (line.find('='), line.find(':')) {
        (Some(eq), Some(colon)) => eq < colon,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Parse recipe bytes in a known encoding
pub fn parse_recipe_as(bytes: &[u8], format: RecipeFormat) -> Result<Recipe> {
    let content = decode_utf8(bytes)?;
    let doc = match format {
        RecipeFormat::Toml => {
            toml::from_str::<RecipeDocument>(content).map_err(|e| syntax_error(e.message()))?
        }
        RecipeFormat::Yaml => serde_yaml::from_str::<RecipeDocument>(content)
            .map_err(|e| syntax_error(&e.to_string()))?,
    };
    Ok(validate(doc)?)
}

/// Parse a recipe file, choosing the encoding from its extension
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let bytes = std::fs::read(path).map_err(|e| {
        Error::IoError(format!("Failed to read recipe file {}: {}", path.display(), e))
    })?;

    match RecipeFormat::from_path(path) {
        Some(format) => parse_recipe_as(&bytes, format),
        None => parse_recipe(&bytes),
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| ValidationError::new("recipe", "document", format!("not UTF-8: {}", e)).into())
}

fn syntax_error(message: &str) -> Error {
    ValidationError::new("recipe", "document", message.trim().to_string()).into()
}

fn validate(doc: RecipeDocument) -> Validated<Recipe> {
    let package = validate_package(doc.package.ok_or_else(|| {
        ValidationError::missing("recipe", "package")
    })?)?;
    let download = validate_download(doc.download.ok_or_else(|| {
        ValidationError::missing("recipe", "download")
    })?)?;
    let build = validate_build(doc.build.ok_or_else(|| {
        ValidationError::missing("recipe", "build")
    })?)?;

    Ok(Recipe {
        package,
        download,
        build,
    })
}

fn validate_package(doc: PackageDocument) -> Validated<Package> {
    let name = doc.name.ok_or_else(|| ValidationError::missing("package", "name"))?;
    let version = doc
        .version
        .ok_or_else(|| ValidationError::missing("package", "version"))?;
    Package::new(name, version)
}

fn validate_download(doc: DownloadDocument) -> Validated<DownloadSpec> {
    let verify = match doc.verify {
        Some(verify) => validate_verify(verify)?,
        None => None,
    };

    match (doc.url, doc.repo) {
        (Some(_), Some(_)) => Err(ValidationError::new(
            "download",
            "repo",
            "conflicts with download.url; use one or the other",
        )),
        (None, None) => Err(ValidationError::missing("download", "url")),
        (Some(url), None) => {
            check_url("download", "url", &url)?;
            match doc.reference {
                Some(reference) => Ok(DownloadSpec::SourceRef(SourceRefDownload {
                    url,
                    reference: check_ref(reference)?,
                    verify,
                })),
                None => Ok(DownloadSpec::Url(UrlDownload { url, verify })),
            }
        }
        (None, Some(repo)) => {
            check_url("download", "repo", &repo)?;
            let reference = match doc.reference {
                Some(reference) => check_ref(reference)?,
                None => DEFAULT_REF.to_string(),
            };
            Ok(DownloadSpec::SourceRef(SourceRefDownload {
                url: repo,
                reference,
                verify,
            }))
        }
    }
}

fn check_ref(reference: String) -> Validated<String> {
    if reference.trim().is_empty() {
        return Err(ValidationError::new("download", "ref", "must not be empty"));
    }
    Ok(reference)
}

fn check_url(context: &str, field: &str, raw: &str) -> Validated<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ValidationError::new(context, field, format!("invalid URL '{}': {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" | "file" => Ok(()),
        other => Err(ValidationError::new(
            context,
            field,
            format!("unsupported URL scheme '{}'", other),
        )),
    }
}

fn validate_verify(doc: VerifyDocument) -> Validated<Option<VerifySpec>> {
    let mut methods = Vec::new();

    if let Some(hex) = doc.sha512 {
        methods.push(("sha512", checksum("sha512", HashAlgorithm::Sha512, hex)?));
    }
    if let Some(hex) = doc.sha256 {
        methods.push(("sha256", checksum("sha256", HashAlgorithm::Sha256, hex)?));
    }
    if let Some(url) = doc.sign {
        check_url("download.verify", "sign", &url)?;
        methods.push(("sign", VerifySpec::Signature { url }));
    }

    if methods.len() > 1 {
        return Err(ValidationError::new(
            "download.verify",
            methods[1].0,
            "only one of sha512, sha256 or sign may be given",
        ));
    }

    Ok(methods.pop().map(|(_, spec)| spec))
}

fn checksum(field: &str, algorithm: HashAlgorithm, hex: String) -> Validated<VerifySpec> {
    Hash::new(algorithm, hex.trim())
        .map(VerifySpec::Checksum)
        .map_err(|e| ValidationError::new("download.verify", field, e.to_string()))
}

fn validate_build(doc: BuildDocument) -> Validated<BuildSpec> {
    let configure = validate_phase(Phase::Configure, doc.configure, None)?;
    let inherited = configure.dir.clone();
    let build = validate_phase(Phase::Build, doc.build, inherited.clone())?;
    let install = validate_phase(Phase::Install, doc.install, inherited)?;

    Ok(BuildSpec {
        configure,
        build,
        install,
        keep_going: doc.keep_going.unwrap_or(false),
    })
}

fn validate_phase(
    phase: Phase,
    doc: Option<PhaseDocument>,
    inherited_dir: Option<std::path::PathBuf>,
) -> Validated<StepGroup> {
    let context = format!("build.{}", phase);
    let Some(doc) = doc else {
        return Ok(StepGroup {
            dir: inherited_dir,
            steps: Vec::new(),
        });
    };

    let dir = match doc.dir {
        Some(dir) => Some(
            sanitize_path(&dir).map_err(|e| ValidationError::new(&context, "dir", e.to_string()))?,
        ),
        None => inherited_dir,
    };

    let steps = match doc.steps {
        Some(steps) => {
            if doc.cmd.is_some() || doc.args.is_some() {
                return Err(ValidationError::new(
                    &context,
                    "steps",
                    "cannot be combined with cmd or args",
                ));
            }
            if let Some(pos) = steps.iter().position(|s| s.trim().is_empty()) {
                return Err(ValidationError::new(
                    &context,
                    "steps",
                    format!("step {} is empty", pos + 1),
                ));
            }
            steps
        }
        None if doc.cmd.as_deref().is_some_and(|c| c.trim().is_empty()) => {
            return Err(ValidationError::new(&context, "cmd", "must not be empty"));
        }
        None if doc.cmd.is_none() && doc.args.is_none() => Vec::new(),
        None => vec![expand_short_form(phase, doc.cmd.as_deref(), doc.args.as_deref())],
    };

    Ok(StepGroup { dir, steps })
}

/// Expand the `{ cmd, args }` form into a single step template
fn expand_short_form(phase: Phase, cmd: Option<&str>, args: Option<&str>) -> String {
    let (default_cmd, default_args) = match phase {
        Phase::Configure => ("{srcdir}/configure", "--prefix={prefix}"),
        Phase::Build => ("make", ""),
        Phase::Install => ("make install", ""),
    };
    let cmd = cmd.unwrap_or(default_cmd).trim();
    let args = args.unwrap_or(default_args).trim();

    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args)
    }
}

// =============================================================================
// Canonical serialization
// =============================================================================

fn to_document(recipe: &Recipe) -> RecipeDocument {
    let (url, reference, verify) = match &recipe.download {
        DownloadSpec::Url(d) => (d.url.clone(), None, d.verify.as_ref()),
        DownloadSpec::SourceRef(d) => (d.url.clone(), Some(d.reference.clone()), d.verify.as_ref()),
    };

    let verify = verify.map(|spec| match spec {
        VerifySpec::Checksum(hash) => match hash.algorithm {
            HashAlgorithm::Sha512 => VerifyDocument {
                sha512: Some(hash.value.clone()),
                ..Default::default()
            },
            HashAlgorithm::Sha256 => VerifyDocument {
                sha256: Some(hash.value.clone()),
                ..Default::default()
            },
        },
        VerifySpec::Signature { url } => VerifyDocument {
            sign: Some(url.clone()),
            ..Default::default()
        },
    });

    let phase = |group: &StepGroup| PhaseDocument {
        dir: group.dir.as_ref().map(|d| d.to_string_lossy().into_owned()),
        steps: Some(group.steps.clone()),
        ..Default::default()
    };

    RecipeDocument {
        package: Some(PackageDocument {
            name: Some(recipe.package.name().to_string()),
            version: Some(recipe.package.version().to_string()),
        }),
        download: Some(DownloadDocument {
            url: Some(url),
            repo: None,
            reference,
            verify,
        }),
        build: Some(BuildDocument {
            keep_going: Some(recipe.build.keep_going),
            configure: Some(phase(&recipe.build.configure)),
            build: Some(phase(&recipe.build.build)),
            install: Some(phase(&recipe.build.install)),
        }),
    }
}

impl Recipe {
    /// Canonical TOML form; parsing it yields an equal recipe
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(&to_document(self))
            .map_err(|e| Error::IoError(format!("Failed to serialize recipe: {}", e)))
    }

    /// Canonical YAML form; parsing it yields an equal recipe
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&to_document(self))
            .map_err(|e| Error::IoError(format!("Failed to serialize recipe: {}", e)))
    }
}
