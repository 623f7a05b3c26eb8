// src/recipe/kitchen/archive.rs

//! Extractor: unpack the verified artifact into the workspace
//!
//! Supports zip, tar (plain or gzip/bzip2/xz/zstd compressed) and bare
//! compressed single files. The format comes from the file name when it has
//! a recognizable extension, otherwise from the content's magic bytes.

use super::workspace::Workspace;
use crate::compression::{create_decoder, decompress_to, decompressed_name, CompressionFormat};
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Bytes needed to see a tar header's `ustar` magic
const SNIFF_LEN: usize = 512;

/// Offset of the `ustar` magic in a tar header
const USTAR_OFFSET: usize = 257;

/// Detected artifact layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar(CompressionFormat),
    /// A single compressed file without a tar layer
    Compressed(CompressionFormat),
}

/// Work out how to unpack `path`
pub fn detect_format(path: &Path) -> Result<ArchiveFormat> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if name.ends_with(".zip") {
        return Ok(ArchiveFormat::Zip);
    }
    if name.ends_with(".tar") {
        return Ok(ArchiveFormat::Tar(CompressionFormat::None));
    }

    let compression = CompressionFormat::from_extension(&name);
    if compression != CompressionFormat::None {
        let is_tar = decompressed_name(&name).is_some_and(|inner| inner.ends_with(".tar"));
        return Ok(if is_tar {
            ArchiveFormat::Tar(compression)
        } else {
            ArchiveFormat::Compressed(compression)
        });
    }

    detect_from_content(path)
}

fn detect_from_content(path: &Path) -> Result<ArchiveFormat> {
    let head = read_head(File::open(path)?)?;

    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        return Ok(ArchiveFormat::Zip);
    }

    let compression = CompressionFormat::from_magic_bytes(&head);
    if compression != CompressionFormat::None {
        let inner = create_decoder(File::open(path)?, compression)
            .ok()
            .and_then(|decoder| read_head(decoder).ok())
            .unwrap_or_default();
        return Ok(if is_ustar(&inner) {
            ArchiveFormat::Tar(compression)
        } else {
            ArchiveFormat::Compressed(compression)
        });
    }

    if is_ustar(&head) {
        return Ok(ArchiveFormat::Tar(CompressionFormat::None));
    }

    Err(Error::UnsupportedFormat(path.to_path_buf()))
}

fn read_head<R: Read>(reader: R) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    reader.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(head)
}

fn is_ustar(head: &[u8]) -> bool {
    head.get(USTAR_OFFSET..USTAR_OFFSET + 5) == Some(b"ustar".as_slice())
}

/// Unpack `artifact` into the workspace and return the package directory
///
/// When the archive holds exactly one top-level directory, that directory
/// is the package directory; otherwise the extraction root is. On failure
/// the extraction root is removed so nothing half-unpacked survives.
pub fn extract(artifact: &Path, workspace: &Workspace) -> Result<PathBuf> {
    let format = detect_format(artifact)?;
    let dest = workspace.extract_dir();
    info!("Extracting {} ({:?})", artifact.display(), format);

    fs::create_dir_all(&dest).map_err(|e| {
        Error::IoError(format!("Failed to create {}: {}", dest.display(), e))
    })?;

    if let Err(e) = unpack(artifact, format, &dest) {
        let _ = fs::remove_dir_all(&dest);
        return Err(e);
    }

    let package_dir = package_dir(&dest)?;
    debug!("Package directory: {}", package_dir.display());
    Ok(package_dir)
}

/// Collapse a lone top-level directory
pub fn package_dir(extract_dir: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(extract_dir)?
        .filter_map(|e| e.ok())
        .collect();

    if entries.len() == 1 && entries[0].file_type().map(|t| t.is_dir()).unwrap_or(false) {
        return Ok(entries[0].path());
    }
    Ok(extract_dir.to_path_buf())
}

fn unpack(artifact: &Path, format: ArchiveFormat, dest: &Path) -> Result<()> {
    let extract_error = |reason: String| Error::Extract {
        archive: artifact.to_path_buf(),
        reason,
    };

    match format {
        ArchiveFormat::Zip => unpack_zip(artifact, dest).map_err(extract_error),
        ArchiveFormat::Tar(compression) => {
            let decoder = create_decoder(File::open(artifact)?, compression)
                .map_err(|e| extract_error(e.to_string()))?;
            unpack_tar(decoder, dest).map_err(extract_error)
        }
        ArchiveFormat::Compressed(compression) => {
            let file_name = artifact
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let out_name = decompressed_name(&file_name).unwrap_or(file_name);
            let out_path = dest.join(crate::filesystem::path::sanitize_filename(&out_name)?);

            let mut out = File::create(&out_path)?;
            decompress_to(File::open(artifact)?, compression, &mut out)
                .map_err(|e| extract_error(e.to_string()))?;
            Ok(())
        }
    }
}

fn escapes(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> std::result::Result<(), String> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_mtime(true);

    let entries = archive.entries().map_err(|e| e.to_string())?;
    for entry in entries {
        let mut entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path().map_err(|e| e.to_string())?.into_owned();
        if escapes(&path) {
            return Err(format!("entry {} escapes the extraction directory", path.display()));
        }
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        if !unpacked {
            return Err(format!("entry {} escapes the extraction directory", path.display()));
        }
    }
    Ok(())
}

fn unpack_zip(artifact: &Path, dest: &Path) -> std::result::Result<(), String> {
    let file = File::open(artifact).map_err(|e| e.to_string())?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;

    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| e.to_string())?;
        if entry.enclosed_name().is_none() {
            return Err(format!("entry {} escapes the extraction directory", entry.name()));
        }
    }

    archive.extract(dest).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn artifact(workspace: &Workspace, name: &str, bytes: &[u8]) -> PathBuf {
        let path = workspace.downloads_dir().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_detect_by_extension() {
        let cases = [
            ("foo.zip", ArchiveFormat::Zip),
            ("foo.tar", ArchiveFormat::Tar(CompressionFormat::None)),
            ("foo.tar.gz", ArchiveFormat::Tar(CompressionFormat::Gzip)),
            ("foo.tgz", ArchiveFormat::Tar(CompressionFormat::Gzip)),
            ("foo.tar.bz2", ArchiveFormat::Tar(CompressionFormat::Bzip2)),
            ("foo.tar.xz", ArchiveFormat::Tar(CompressionFormat::Xz)),
            ("foo.tar.zst", ArchiveFormat::Tar(CompressionFormat::Zstd)),
            ("foo.gz", ArchiveFormat::Compressed(CompressionFormat::Gzip)),
            ("foo.bz2", ArchiveFormat::Compressed(CompressionFormat::Bzip2)),
        ];
        for (name, expected) in cases {
            assert_eq!(detect_format(Path::new(name)).unwrap(), expected, "{}", name);
        }
    }

    #[test]
    fn test_detect_by_magic() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(parent.path()).unwrap();

        let tgz = artifact(&workspace, "v1.0", &tar_gz(&[("a/b", b"x")]));
        assert_eq!(detect_format(&tgz).unwrap(), ArchiveFormat::Tar(CompressionFormat::Gzip));

        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"just text").unwrap();
        let gz = artifact(&workspace, "blob", &encoder.finish().unwrap());
        assert_eq!(detect_format(&gz).unwrap(), ArchiveFormat::Compressed(CompressionFormat::Gzip));

        let unknown = artifact(&workspace, "mystery", b"plain text, no magic");
        assert!(matches!(detect_format(&unknown), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_single_top_level_dir_is_collapsed() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(parent.path()).unwrap();
        let path = artifact(
            &workspace,
            "foo-1.0.tar.gz",
            &tar_gz(&[("foo-1.0/configure", b"#!/bin/sh\n"), ("foo-1.0/src/main.c", b"int main;")]),
        );

        let dir = extract(&path, &workspace).unwrap();
        assert_eq!(dir, workspace.extract_dir().join("foo-1.0"));
        assert!(dir.join("src/main.c").is_file());
    }

    #[test]
    fn test_multi_entry_returns_root() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(parent.path()).unwrap();
        let path = artifact(&workspace, "flat.tar.gz", &tar_gz(&[("a.txt", b"a"), ("b.txt", b"b")]));

        let dir = extract(&path, &workspace).unwrap();
        assert_eq!(dir, workspace.extract_dir());
        assert!(dir.join("a.txt").is_file());
        assert!(dir.join("b.txt").is_file());
    }

    #[test]
    fn test_zip_extraction() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(parent.path()).unwrap();

        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("pkg/README", options).unwrap();
        zip.write_all(b"hello").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let path = artifact(&workspace, "pkg.zip", &bytes);
        let dir = extract(&path, &workspace).unwrap();
        assert_eq!(fs::read(dir.join("README")).unwrap(), b"hello");
    }

    #[test]
    fn test_bare_compressed_file() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(parent.path()).unwrap();

        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(b"#!/bin/sh\necho hi\n").unwrap();
        let path = artifact(&workspace, "tool.sh.xz", &encoder.finish().unwrap());

        let dir = extract(&path, &workspace).unwrap();
        assert_eq!(dir, workspace.extract_dir());
        assert_eq!(fs::read(dir.join("tool.sh")).unwrap(), b"#!/bin/sh\necho hi\n");
    }

    #[test]
    fn test_corrupt_archive_cleans_up() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(parent.path()).unwrap();
        let mut bytes = tar_gz(&[("foo/a", &[7u8; 4096])]);
        bytes.truncate(bytes.len() / 2);
        let path = artifact(&workspace, "foo.tar.gz", &bytes);

        let err = extract(&path, &workspace).unwrap_err();
        assert!(matches!(err, Error::Extract { .. }));
        assert!(!workspace.extract_dir().exists());
    }

    #[test]
    fn test_traversal_entry_rejected() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(parent.path()).unwrap();

        // tar::Builder refuses `..` paths, so write the name into the header directly
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_old();
        header.as_old_mut().name[..9].copy_from_slice(b"../escape");
        header.set_size(1);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &b"x"[..]).unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let path = artifact(&workspace, "evil.tar.gz", &bytes);
        let err = extract(&path, &workspace).unwrap_err();
        assert!(err.to_string().contains("escapes"));
        assert!(!workspace.root().join("escape").exists());
    }

    #[test]
    fn test_unknown_format() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(parent.path()).unwrap();
        let path = artifact(&workspace, "notes.txt", b"hello");
        assert_eq!(
            extract(&path, &workspace).unwrap_err().kind(),
            crate::error::ErrorKind::Extract
        );
    }
}
