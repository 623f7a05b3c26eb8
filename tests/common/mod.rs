// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use sequoia_openpgp as openpgp;
use openpgp::cert::CertBuilder;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::stream::{Message, Signer};
use openpgp::serialize::Serialize;
use setpm::repository::{HttpClient, HttpResponse};
use setpm::{KitchenConfig, Linker};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub const FOO_URL: &str = "https://example.test/foo-1.0.tar.gz";

/// `configure` script that honours `--prefix=` and leaves a marker there
pub const CONFIGURE: &str = r#"#!/bin/sh
for arg in "$@"; do
    case "$arg" in
        --prefix=*) prefix="${arg#--prefix=}" ;;
    esac
done
mkdir -p "$prefix/bin" "$prefix/share/foo"
echo built > "$prefix/marker"
printf '#!/bin/sh\necho foo\n' > "$prefix/bin/foo"
chmod 755 "$prefix/bin/foo"
echo data > "$prefix/share/foo/data.txt"
"#;

/// In-memory HTTP server keyed by URL; unknown URLs are 404
#[derive(Default)]
pub struct FixtureClient {
    routes: Mutex<HashMap<String, Vec<u8>>>,
}

impl FixtureClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(self, url: &str, body: Vec<u8>) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), body);
        self
    }
}

impl HttpClient for FixtureClient {
    fn get(&self, url: &str) -> setpm::Result<HttpResponse> {
        match self.routes.lock().unwrap().get(url) {
            Some(body) => Ok(HttpResponse::ok(body.clone())),
            None => Ok(HttpResponse::status(404)),
        }
    }
}

/// A file to put in a fixture archive
pub struct Entry<'a> {
    pub path: &'a str,
    pub data: &'a [u8],
    pub mode: u32,
}

pub fn file<'a>(path: &'a str, data: &'a [u8]) -> Entry<'a> {
    Entry { path, data, mode: 0o644 }
}

pub fn script<'a>(path: &'a str, data: &'a str) -> Entry<'a> {
    Entry {
        path,
        data: data.as_bytes(),
        mode: 0o755,
    }
}

pub fn tar_gz(entries: &[Entry<'_>]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(entry.data.len() as u64);
        header.set_mode(entry.mode);
        header.set_cksum();
        builder.append_data(&mut header, entry.path, entry.data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn zip(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for entry in entries {
        let options = zip::write::SimpleFileOptions::default().unix_permissions(entry.mode);
        writer.start_file(entry.path, options).unwrap();
        writer.write_all(entry.data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// The `foo-1.0` source tarball
pub fn foo_archive() -> Vec<u8> {
    tar_gz(&[
        script("foo-1.0/configure", CONFIGURE),
        file("foo-1.0/README", b"foo\n"),
    ])
}

/// Recipe for foo 1.0 with the given `[download]` body
pub fn foo_recipe(download: &str) -> String {
    format!(
        r#"[package]
name = "foo"
version = "1.0"

[download]
{download}

[build.configure]
cmd = "./configure"

[build.build]

[build.install]
"#
    )
}

/// Scratch directories for one test
pub struct TestEnv {
    pub tmp: TempDir,
    pub cellar: PathBuf,
    pub work: PathBuf,
    pub keyring: PathBuf,
    pub prefix: PathBuf,
    pub locks: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let env = Self {
            cellar: root.join("cellar"),
            work: root.join("work"),
            keyring: root.join("keys"),
            prefix: root.join("prefix"),
            locks: root.join("locks"),
            tmp,
        };
        fs::create_dir_all(&env.prefix).unwrap();
        env
    }

    pub fn kitchen_config(&self) -> KitchenConfig {
        KitchenConfig::new(&self.cellar)
            .with_work_dir(&self.work)
            .with_keyring(&self.keyring)
    }

    pub fn linker(&self) -> Linker {
        Linker::new(&self.prefix, &self.locks)
    }

    /// No workspace survived the run
    pub fn work_is_clean(&self) -> bool {
        fs::read_dir(&self.work)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

/// What a tree holds, ignoring directories: file contents and link targets
#[derive(Debug, PartialEq, Eq)]
pub enum Node {
    File(Vec<u8>),
    Link(PathBuf),
}

pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Node> {
    let mut nodes = BTreeMap::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            nodes.insert(relative, Node::Link(fs::read_link(entry.path()).unwrap()));
        } else if file_type.is_file() {
            nodes.insert(relative, Node::File(fs::read(entry.path()).unwrap()));
        }
    }
    nodes
}

pub fn generate_cert() -> openpgp::Cert {
    let (cert, _rev) = CertBuilder::general_purpose(None, Some("release@example.test"))
        .generate()
        .unwrap();
    cert
}

pub fn public_key(cert: &openpgp::Cert) -> Vec<u8> {
    let mut out = Vec::new();
    cert.serialize(&mut out).unwrap();
    out
}

/// Detached signature of `data` by `cert`
pub fn detached_signature(cert: &openpgp::Cert, data: &[u8]) -> Vec<u8> {
    let policy = StandardPolicy::new();
    let keypair = cert
        .keys()
        .unencrypted_secret()
        .with_policy(&policy, None)
        .supported()
        .alive()
        .revoked(false)
        .for_signing()
        .next()
        .unwrap()
        .key()
        .clone()
        .into_keypair()
        .unwrap();

    let mut sig = Vec::new();
    {
        let message = Message::new(&mut sig);
        let mut signer = Signer::new(message, keypair).detached().build().unwrap();
        signer.write_all(data).unwrap();
        signer.finalize().unwrap();
    }
    sig
}
