// src/repository/gpg.rs

//! OpenPGP detached-signature verification
//!
//! The keyring is a plain directory of certificates (`*.asc`, `*.gpg`,
//! `*.pgp`). Every certificate in it is trusted to sign any artifact; there
//! is no per-package pinning. Uses the sequoia-openpgp library (pure Rust
//! implementation).

use crate::error::{Error, Result};
use openpgp::parse::stream::{
    DetachedVerifierBuilder, GoodChecksum, MessageLayer, MessageStructure, VerificationHelper,
};
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::{Cert, KeyHandle};
use sequoia_openpgp as openpgp;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const KEY_EXTENSIONS: &[&str] = &["asc", "gpg", "pgp"];

/// Offers every trusted certificate and accepts any good signature
struct TrustedKeys<'a> {
    certs: &'a [Cert],
}

impl VerificationHelper for TrustedKeys<'_> {
    fn get_certs(&mut self, _ids: &[KeyHandle]) -> openpgp::Result<Vec<Cert>> {
        Ok(self.certs.to_vec())
    }

    fn check(&mut self, structure: MessageStructure) -> openpgp::Result<()> {
        for layer in structure.into_iter() {
            if let MessageLayer::SignatureGroup { results } = layer {
                for result in results {
                    match result {
                        Ok(GoodChecksum { ka, .. }) => {
                            debug!("Good signature from key {}", ka.key().fingerprint());
                            return Ok(());
                        }
                        Err(e) => debug!("Rejected signature: {}", e),
                    }
                }
            }
        }
        Err(anyhow::anyhow!("no valid signature from a trusted key"))
    }
}

/// Keyring-backed signature verifier
pub struct GpgVerifier {
    keyring_dir: PathBuf,
    policy: StandardPolicy<'static>,
}

impl GpgVerifier {
    /// Create a verifier over `keyring_dir`
    ///
    /// The directory does not have to exist; a missing keyring simply
    /// trusts nobody.
    pub fn new(keyring_dir: impl Into<PathBuf>) -> Self {
        Self {
            keyring_dir: keyring_dir.into(),
            policy: StandardPolicy::new(),
        }
    }

    pub fn keyring_dir(&self) -> &Path {
        &self.keyring_dir
    }

    /// Import a certificate into the keyring
    ///
    /// The file is stored as `<fingerprint>.asc`. Returns the fingerprint.
    pub fn import_key(&self, key_data: &[u8]) -> Result<String> {
        let cert = openpgp::Cert::from_bytes(key_data)
            .map_err(|e| Error::SignatureInvalid(format!("Failed to parse key: {}", e)))?;

        let fingerprint = cert.fingerprint().to_hex();
        debug!("Importing key with fingerprint: {}", fingerprint);

        fs::create_dir_all(&self.keyring_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create keyring directory {}: {}",
                self.keyring_dir.display(),
                e
            ))
        })?;

        let key_path = self.keyring_dir.join(format!("{}.asc", fingerprint));
        fs::write(&key_path, key_data)
            .map_err(|e| Error::IoError(format!("Failed to write key: {}", e)))?;

        info!("Imported key {} into {}", fingerprint, self.keyring_dir.display());
        Ok(fingerprint)
    }

    /// Import a certificate from a file
    pub fn import_key_from_file(&self, key_path: &Path) -> Result<String> {
        let key_data = fs::read(key_path).map_err(|e| {
            Error::IoError(format!("Failed to read key file {}: {}", key_path.display(), e))
        })?;
        self.import_key(&key_data)
    }

    /// Load every parsable certificate in the keyring
    ///
    /// Unparsable files are skipped with a warning rather than poisoning the
    /// whole keyring.
    pub fn load_certs(&self) -> Result<Vec<openpgp::Cert>> {
        let mut certs = Vec::new();
        if !self.keyring_dir.is_dir() {
            return Ok(certs);
        }

        let entries = fs::read_dir(&self.keyring_dir)
            .map_err(|e| Error::IoError(format!("Failed to read keyring directory: {}", e)))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| KEY_EXTENSIONS.contains(&ext))
            })
            .collect();
        paths.sort();

        for path in paths {
            match fs::read(&path).map(|data| openpgp::Cert::from_bytes(&data)) {
                Ok(Ok(cert)) => certs.push(cert),
                Ok(Err(e)) => warn!("Skipping unparsable key {}: {}", path.display(), e),
                Err(e) => warn!("Skipping unreadable key {}: {}", path.display(), e),
            }
        }

        Ok(certs)
    }

    /// Verify a detached signature over `file_path`
    ///
    /// Succeeds if any signature packet verifies against a signing-capable
    /// key of any trusted certificate. The artifact is streamed, never read
    /// into memory whole.
    pub fn verify_signature(&self, file_path: &Path, signature_path: &Path) -> Result<()> {
        debug!("Verifying signature for {}", file_path.display());

        let certs = self.load_certs()?;
        if certs.is_empty() {
            return Err(Error::SignatureInvalid(format!(
                "no trusted keys in {}; import one with `set key-import`",
                self.keyring_dir.display()
            )));
        }

        if !file_path.is_file() {
            return Err(Error::IoError(format!(
                "Failed to read file to verify: {} not found",
                file_path.display()
            )));
        }

        let helper = TrustedKeys { certs: &certs };
        let mut verifier = DetachedVerifierBuilder::from_file(signature_path)
            .and_then(|builder| builder.with_policy(&self.policy, None, helper))
            .map_err(|e| Error::SignatureInvalid(format!("Failed to parse signature: {}", e)))?;

        verifier
            .verify_file(file_path)
            .map_err(|e| Error::SignatureInvalid(e.to_string()))?;

        info!("Verified signature for {}", file_path.display());
        Ok(())
    }
}
