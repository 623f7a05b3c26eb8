// src/error.rs

//! Error types shared across the crate

use crate::compression::CompressionError;
use crate::hash::{HashAlgorithm, HashError, VerifyError};
use crate::recipe::ValidationError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Broad error category, used to decide how a failure is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    RecipeNotFound,
    Fetch,
    Verify,
    Extract,
    Build,
    LinkConflict,
    NotInstalled,
    AlreadyInstalled,
    Cancelled,
    Config,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::RecipeNotFound => "recipe-not-found",
            Self::Fetch => "fetch",
            Self::Verify => "verify",
            Self::Extract => "extract",
            Self::Build => "build",
            Self::LinkConflict => "link-conflict",
            Self::NotInstalled => "not-installed",
            Self::AlreadyInstalled => "already-installed",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// Errors produced by the recipe pipeline, the cellar and the linker
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed recipe document
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Recipe could not be located locally or in the recipe index
    #[error("recipe '{name}' not found: {reason}")]
    RecipeNotFound { name: String, reason: String },

    /// Network, transport or non-success response while downloading
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Artifact digest does not match the recipe
    #[error("{algorithm} mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        algorithm: HashAlgorithm,
        expected: String,
        actual: String,
    },

    /// Detached signature missing, malformed or not made by a trusted key
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Artifact is neither a known archive nor a known compressed file
    #[error("unsupported archive format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Corrupt or truncated archive
    #[error("failed to extract {}: {reason}", archive.display())]
    Extract { archive: PathBuf, reason: String },

    /// A build step exited unsuccessfully
    #[error("{phase} step `{step}` failed with {}", exit_status(*exit_code))]
    BuildFailed {
        phase: String,
        step: String,
        exit_code: Option<i32>,
    },

    /// A build step exceeded the configured timeout
    #[error("{phase} step `{step}` timed out after {}s", timeout.as_secs())]
    BuildTimeout {
        phase: String,
        step: String,
        timeout: Duration,
    },

    /// A build step could not be started
    #[error("failed to run {phase} step `{step}`: {reason}")]
    BuildSpawn {
        phase: String,
        step: String,
        reason: String,
    },

    /// The install phase finished without writing anything
    #[error("no files were installed to {}", .0.display())]
    EmptyInstall(PathBuf),

    /// A foreign file occupies a link destination
    #[error("{} exists and is not a symlink", path.display())]
    LinkConflict { path: PathBuf },

    /// No cellar entry for the package
    #[error("{0} is not installed")]
    NotInstalled(String),

    /// Cellar entry already present and reinstalling was not requested
    #[error("{0} is already installed")]
    AlreadyInstalled(String),

    /// Untrusted path would escape its root
    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    /// Untrusted path is empty or otherwise unusable
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Interrupted by the user
    #[error("interrupted")]
    Cancelled,

    /// Invalid configuration file or value
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error with a message describing the operation
    #[error("{0}")]
    IoError(String),

    /// Plain I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_status(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (killed by signal)".to_string(),
    }
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::PathTraversal(_) | Self::InvalidPath(_) => {
                ErrorKind::Validation
            }
            Self::RecipeNotFound { .. } => ErrorKind::RecipeNotFound,
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::ChecksumMismatch { .. } | Self::SignatureInvalid(_) => ErrorKind::Verify,
            Self::UnsupportedFormat(_) | Self::Extract { .. } => ErrorKind::Extract,
            Self::BuildFailed { .. }
            | Self::BuildTimeout { .. }
            | Self::BuildSpawn { .. }
            | Self::EmptyInstall(_) => ErrorKind::Build,
            Self::LinkConflict { .. } => ErrorKind::LinkConflict,
            Self::NotInstalled(_) => ErrorKind::NotInstalled,
            Self::AlreadyInstalled(_) => ErrorKind::AlreadyInstalled,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Config,
            Self::IoError(_) | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Build a fetch error for `url`
    pub fn fetch(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<VerifyError> for Error {
    fn from(e: VerifyError) -> Self {
        Self::ChecksumMismatch {
            algorithm: e.algorithm,
            expected: e.expected,
            actual: e.actual,
        }
    }
}

impl From<HashError> for Error {
    fn from(e: HashError) -> Self {
        Self::IoError(e.to_string())
    }
}

impl From<CompressionError> for Error {
    fn from(e: CompressionError) -> Self {
        Self::IoError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::fetch("https://x.test/a", "boom").kind(), ErrorKind::Fetch);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            Error::SignatureInvalid("bad".to_string()).kind(),
            ErrorKind::Verify
        );
        assert_eq!(
            Error::EmptyInstall(PathBuf::from("/c/foo/1.0")).kind(),
            ErrorKind::Build
        );
    }

    #[test]
    fn test_verify_error_conversion() {
        let err: Error = VerifyError {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
            algorithm: HashAlgorithm::Sha512,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Verify);
        assert_eq!(err.to_string(), "sha512 mismatch: expected aa, got bb");
    }

    #[test]
    fn test_build_failed_message() {
        let err = Error::BuildFailed {
            phase: "configure".to_string(),
            step: "./configure".to_string(),
            exit_code: Some(2),
        };
        assert_eq!(err.to_string(), "configure step `./configure` failed with exit code 2");
    }
}
