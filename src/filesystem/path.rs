// src/filesystem/path.rs

//! Path sanitization for untrusted input
//!
//! Recipes, archive entries and download URLs all carry paths written by
//! someone else. Everything that ends up joined onto the cellar, the
//! workspace or the prefix goes through one of these helpers first.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Normalize an untrusted relative path
///
/// Leading slashes and `.` components are dropped; any `..` component is
/// rejected outright rather than resolved, as is a path that is empty after
/// normalization.
///
/// # Examples
///
/// ```
/// use setpm::filesystem::path::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("./build").unwrap(), PathBuf::from("build"));
/// assert_eq!(sanitize_path("/src/lib").unwrap(), PathBuf::from("src/lib"));
/// assert!(sanitize_path("foo/../../etc").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let display = path.to_string_lossy();

    let mut normalized = PathBuf::new();
    for component in Path::new(display.trim_start_matches('/')).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => return Err(Error::PathTraversal(display.to_string())),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!("'{}' is empty after normalization", display)));
    }

    Ok(normalized)
}

/// Join an untrusted relative path onto `root`
///
/// When both sides already exist they are canonicalized and the result must
/// still sit under `root`; this catches symlinks planted earlier in the tree.
///
/// # Examples
///
/// ```
/// use setpm::filesystem::path::safe_join;
/// use std::path::{Path, PathBuf};
///
/// let root = Path::new("/tmp/set-work/extract");
/// assert_eq!(
///     safe_join(root, "foo-1.0/configure").unwrap(),
///     PathBuf::from("/tmp/set-work/extract/foo-1.0/configure")
/// );
/// assert!(safe_join(root, "../../etc/passwd").is_err());
/// ```
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let joined = root.join(sanitize_path(path)?);

    if let (Ok(canonical_root), Ok(canonical_joined)) =
        (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "{} escapes {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Validate a single path component
///
/// Package names and versions become `cellar/<name>/<version>`, and
/// downloaded artifacts are stored under their URL file name, so none of
/// them may contain a separator or be `.`/`..`.
///
/// # Examples
///
/// ```
/// use setpm::filesystem::path::sanitize_filename;
///
/// assert_eq!(sanitize_filename("foo-1.0.tar.gz").unwrap(), "foo-1.0.tar.gz");
/// assert!(sanitize_filename("../foo").is_err());
/// assert!(sanitize_filename("1.0/beta").is_err());
/// ```
pub fn sanitize_filename(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::InvalidPath("empty file name".to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(Error::PathTraversal(format!(
            "'{}' contains a path separator",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::PathTraversal(format!("'{}' is not a file name", name)));
    }

    Ok(name.to_string())
}
