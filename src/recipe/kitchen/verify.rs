// src/recipe/kitchen/verify.rs

//! Verifier: establish the artifact's integrity before it is unpacked

use super::workspace::Workspace;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::hash::{verify_file, Hash};
use crate::recipe::format::VerifySpec;
use crate::repository::{download_file, GpgVerifier, HttpClient};
use std::path::Path;
use tracing::{debug, info, warn};

/// One verification method
pub trait VerifyStrategy {
    fn verify(&self, artifact: &Path, workspace: &Workspace) -> Result<()>;
}

/// Compare the artifact's digest with the recipe
pub struct ChecksumVerify<'a> {
    pub expected: &'a Hash,
}

impl VerifyStrategy for ChecksumVerify<'_> {
    fn verify(&self, artifact: &Path, _workspace: &Workspace) -> Result<()> {
        verify_file(artifact, self.expected).map_err(|e| {
            Error::IoError(format!("Failed to read {}: {}", artifact.display(), e))
        })??;
        info!("{} checksum OK for {}", self.expected.algorithm, artifact.display());
        Ok(())
    }
}

/// Fetch a detached signature and check it against the keyring
pub struct SignatureVerify<'a> {
    pub url: &'a str,
    pub client: &'a dyn HttpClient,
    pub gpg: &'a GpgVerifier,
    pub cancel: &'a CancelToken,
}

impl VerifyStrategy for SignatureVerify<'_> {
    fn verify(&self, artifact: &Path, workspace: &Workspace) -> Result<()> {
        let artifact_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        let sig_path = workspace.downloads_dir().join(format!("{}.sig", artifact_name));

        debug!("Fetching signature {}", self.url);
        download_file(self.client, self.url, &sig_path, None, self.cancel).map_err(|e| match e {
            Error::Cancelled => Error::Cancelled,
            other => Error::SignatureInvalid(format!("could not fetch signature: {}", other)),
        })?;

        self.gpg.verify_signature(artifact, &sig_path)
    }
}

/// Dispatches a recipe's verification method
pub struct Verifier<'a> {
    client: &'a dyn HttpClient,
    gpg: GpgVerifier,
    cancel: &'a CancelToken,
}

impl<'a> Verifier<'a> {
    pub fn new(client: &'a dyn HttpClient, keyring: &Path, cancel: &'a CancelToken) -> Self {
        Self {
            client,
            gpg: GpgVerifier::new(keyring),
            cancel,
        }
    }

    /// Verify `artifact` according to `spec`; no spec means nothing to check
    pub fn verify(
        &self,
        artifact: &Path,
        spec: Option<&VerifySpec>,
        workspace: &Workspace,
    ) -> Result<()> {
        match spec {
            None => {
                warn!(
                    "No verification declared for {}; trusting it as downloaded",
                    artifact.display()
                );
                Ok(())
            }
            Some(VerifySpec::Checksum(expected)) => {
                ChecksumVerify { expected }.verify(artifact, workspace)
            }
            Some(VerifySpec::Signature { url }) => SignatureVerify {
                url,
                client: self.client,
                gpg: &self.gpg,
                cancel: self.cancel,
            }
            .verify(artifact, workspace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hash::{sha256, sha512, HashAlgorithm};
    use crate::repository::HttpResponse;
    use std::fs;

    struct NoNetwork;

    impl HttpClient for NoNetwork {
        fn get(&self, _url: &str) -> Result<HttpResponse> {
            Ok(HttpResponse::status(404))
        }
    }

    fn setup(content: &[u8]) -> (tempfile::TempDir, Workspace, std::path::PathBuf) {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(parent.path()).unwrap();
        let artifact = workspace.downloads_dir().join("foo-1.0.tar.gz");
        fs::write(&artifact, content).unwrap();
        (parent, workspace, artifact)
    }

    #[test]
    fn test_no_spec_is_noop() {
        let (parent, workspace, artifact) = setup(b"anything");
        let cancel = CancelToken::new();
        let verifier = Verifier::new(&NoNetwork, &parent.path().join("keys"), &cancel);
        verifier.verify(&artifact, None, &workspace).unwrap();
    }

    #[test]
    fn test_checksum_match_any_case() {
        let (parent, workspace, artifact) = setup(b"tarball bytes");
        let cancel = CancelToken::new();
        let verifier = Verifier::new(&NoNetwork, &parent.path().join("keys"), &cancel);

        let upper = Hash::new(HashAlgorithm::Sha512, sha512(b"tarball bytes").to_uppercase()).unwrap();
        verifier
            .verify(&artifact, Some(&VerifySpec::Checksum(upper)), &workspace)
            .unwrap();

        let sha = Hash::new(HashAlgorithm::Sha256, sha256(b"tarball bytes")).unwrap();
        verifier
            .verify(&artifact, Some(&VerifySpec::Checksum(sha)), &workspace)
            .unwrap();
    }

    #[test]
    fn test_single_byte_mutation_fails() {
        let original = b"tarball bytes".to_vec();
        let expected = Hash::new(HashAlgorithm::Sha512, sha512(&original)).unwrap();
        let spec = VerifySpec::Checksum(expected);

        for i in 0..original.len() {
            let mut tampered = original.clone();
            tampered[i] ^= 0x01;
            let (parent, workspace, artifact) = setup(&tampered);
            let cancel = CancelToken::new();
            let verifier = Verifier::new(&NoNetwork, &parent.path().join("keys"), &cancel);

            let err = verifier.verify(&artifact, Some(&spec), &workspace).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Verify);
            match err {
                Error::ChecksumMismatch { expected, actual, .. } => {
                    assert_eq!(expected, sha512(&original));
                    assert_eq!(actual, sha512(&tampered));
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_signature_is_verify_error() {
        let (parent, workspace, artifact) = setup(b"data");
        let cancel = CancelToken::new();
        let verifier = Verifier::new(&NoNetwork, &parent.path().join("keys"), &cancel);
        let spec = VerifySpec::Signature {
            url: "https://example.test/foo.sig".to_string(),
        };

        let err = verifier.verify(&artifact, Some(&spec), &workspace).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Verify);
        assert!(err.to_string().contains("could not fetch signature"));
    }
}
