// src/recipe/kitchen/fetch.rs

//! Fetcher: bring the source artifact into the workspace

use super::workspace::Workspace;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::filesystem::path::sanitize_filename;
use crate::recipe::format::{DownloadSpec, SourceRefDownload, UrlDownload};
use crate::repository::{download_file, HttpClient};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

/// Fallback artifact name when the URL has no usable last segment
const DEFAULT_ARTIFACT_NAME: &str = "source";

/// One way of turning a download spec into a fetchable artifact
pub trait DownloadStrategy {
    /// URL the artifact is actually downloaded from
    fn artifact_url(&self) -> Result<String>;

    /// File name the artifact is stored under in the workspace
    fn artifact_name(&self) -> String;
}

impl DownloadStrategy for UrlDownload {
    fn artifact_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn artifact_name(&self) -> String {
        last_segment(&self.url)
            .and_then(|name| sanitize_filename(&name).ok())
            .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string())
    }
}

impl DownloadStrategy for SourceRefDownload {
    /// `<repo>/archive/<ref>.tar.gz`, the tarball convention of the common
    /// git forges
    fn artifact_url(&self) -> Result<String> {
        let repo = repo_base(&self.url);
        if repo.is_empty() {
            return Err(Error::fetch(&self.url, "repository URL is empty"));
        }
        Ok(format!("{}/archive/{}.tar.gz", repo, self.reference))
    }

    fn artifact_name(&self) -> String {
        let repo = last_segment(repo_base(&self.url))
            .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string());
        let name = format!("{}-{}.tar.gz", repo, self.reference.replace('/', "-"));
        sanitize_filename(&name).unwrap_or_else(|_| format!("{}.tar.gz", DEFAULT_ARTIFACT_NAME))
    }
}

/// The strategy for a download spec
pub fn strategy(spec: &DownloadSpec) -> &dyn DownloadStrategy {
    match spec {
        DownloadSpec::Url(d) => d,
        DownloadSpec::SourceRef(d) => d,
    }
}

fn repo_base(url: &str) -> &str {
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url)
}

fn last_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    Some(segment.to_string())
}

/// Downloads artifacts through an [`HttpClient`]
pub struct Fetcher<'a> {
    client: &'a dyn HttpClient,
    cancel: &'a CancelToken,
    progress: bool,
}

impl<'a> Fetcher<'a> {
    pub fn new(client: &'a dyn HttpClient, cancel: &'a CancelToken, progress: bool) -> Self {
        Self {
            client,
            cancel,
            progress,
        }
    }

    /// Fetch the artifact described by `spec` into the workspace
    pub fn fetch(&self, spec: &DownloadSpec, workspace: &Workspace) -> Result<PathBuf> {
        let strategy = strategy(spec);
        let url = strategy.artifact_url()?;
        let name = strategy.artifact_name();
        let dest = workspace.downloads_dir().join(&name);

        let progress_bar = self.progress.then(|| {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            pb.set_message(name.clone());
            pb
        });

        let bytes = download_file(self.client, &url, &dest, progress_bar.as_ref(), self.cancel)?;
        info!("Fetched {} ({} bytes)", name, bytes);
        Ok(dest)
    }
}
