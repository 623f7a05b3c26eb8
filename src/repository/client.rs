// src/repository/client.rs

//! HTTP transport for source artifacts, signatures and recipes
//!
//! Everything that leaves the machine goes through the [`HttpClient`] trait
//! so the pipeline can be driven by an in-memory client in tests. The
//! production implementation wraps a blocking reqwest client with retry on
//! transport errors and reads `file://` URLs straight from disk.

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use indicatif::ProgressBar;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
///
/// The blocking client applies it to connecting and to each read of the
/// body, so a stalled server fails the download without capping how long a
/// large artifact may take overall.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a request that fails at the transport level
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Slice of the retry delay between cancellation checks
const RETRY_POLL: Duration = Duration::from_millis(100);

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// A response whose body has not been read yet
pub struct HttpResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    /// A 200 response serving `bytes`
    pub fn ok(bytes: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_length: Some(bytes.len() as u64),
            body: Box::new(io::Cursor::new(bytes)),
        }
    }

    /// An empty response with the given status
    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_length: Some(0),
            body: Box::new(io::empty()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Blocking GET transport
///
/// Implementations return `Ok` for any HTTP response, successful or not;
/// `Err` is reserved for transport failures. Callers decide what a non-2xx
/// status means for them.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
    cancel: CancelToken,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    /// Client whose connect and per-read timeout is `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(concat!("set/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::IoError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
            cancel: CancelToken::new(),
        })
    }

    /// Stop retrying once `cancel` is tripped
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn backoff(&self, attempt: u32) -> Result<()> {
        let deadline = std::time::Instant::now() + Duration::from_millis(RETRY_DELAY_MS * attempt as u64);
        while std::time::Instant::now() < deadline {
            self.cancel.check()?;
            std::thread::sleep(RETRY_POLL);
        }
        self.cancel.check()
    }

    fn get_file(&self, url: &str) -> Result<HttpResponse> {
        let path = url::Url::parse(url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| Error::fetch(url, "not a local file URL"))?;

        match File::open(&path) {
            Ok(file) => {
                let content_length = file.metadata().ok().map(|m| m.len());
                Ok(HttpResponse {
                    status: 200,
                    content_length,
                    body: Box::new(file),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HttpResponse::status(404)),
            Err(e) => Err(Error::fetch(url, e)),
        }
    }
}

impl HttpClient for RepositoryClient {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        if url.starts_with("file://") {
            return self.get_file(url);
        }

        let mut attempt = 0;
        loop {
            self.cancel.check()?;
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    debug!("GET {} -> {}", url, response.status());
                    return Ok(HttpResponse {
                        status: response.status().as_u16(),
                        content_length: response.content_length(),
                        body: Box::new(response),
                    });
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::fetch(
                            url,
                            format!("failed after {attempt} attempts: {e}"),
                        ));
                    }
                    warn!("Request attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    self.backoff(attempt)?;
                }
            }
        }
    }
}

/// GET `url` and require a 2xx response
pub fn get_success(client: &dyn HttpClient, url: &str) -> Result<HttpResponse> {
    let response = client.get(url)?;
    if !response.is_success() {
        return Err(Error::fetch(url, format!("HTTP {}", response.status)));
    }
    Ok(response)
}

/// Download `url` into `dest_path`, streaming in fixed-size chunks
///
/// The body is written to `<dest>.part` and renamed into place once complete,
/// so `dest_path` only ever holds a whole artifact. Cancellation is checked
/// between chunks. Returns the number of bytes written.
pub fn download_file(
    client: &dyn HttpClient,
    url: &str,
    dest_path: &Path,
    progress_bar: Option<&ProgressBar>,
    cancel: &CancelToken,
) -> Result<u64> {
    info!("Downloading {} to {}", url, dest_path.display());

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
        })?;
    }

    let mut response = get_success(client, url)?;

    let mut part_name = dest_path.as_os_str().to_owned();
    part_name.push(".part");
    let part_path = std::path::PathBuf::from(part_name);

    let mut file = File::create(&part_path).map_err(|e| {
        Error::IoError(format!("Failed to create file {}: {e}", part_path.display()))
    })?;

    if let Some(pb) = progress_bar {
        pb.set_length(response.content_length.unwrap_or(0));
    }

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];
    let streamed = loop {
        if let Err(e) = cancel.check() {
            break Err(e);
        }

        let bytes_read = match response.body.read(&mut buffer) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(Error::fetch(url, format!("failed to read response: {e}"))),
        };

        if let Err(e) = file.write_all(&buffer[..bytes_read]) {
            break Err(Error::IoError(format!("Failed to write downloaded data: {e}")));
        }

        downloaded += bytes_read as u64;
        if let Some(pb) = progress_bar {
            pb.set_position(downloaded);
        }
    };

    if let Err(e) = streamed {
        drop(file);
        let _ = fs::remove_file(&part_path);
        return Err(e);
    }

    if let Some(expected) = response.content_length
        && expected > 0
        && expected != downloaded
    {
        let _ = fs::remove_file(&part_path);
        return Err(Error::fetch(
            url,
            format!("truncated body: expected {expected} bytes, got {downloaded}"),
        ));
    }

    fs::rename(&part_path, dest_path).map_err(|e| {
        Error::IoError(format!(
            "Failed to move {} to {}: {e}",
            part_path.display(),
            dest_path.display()
        ))
    })?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    info!("Downloaded {} bytes", downloaded);
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeClient(HashMap<String, Vec<u8>>);

    impl HttpClient for FakeClient {
        fn get(&self, url: &str) -> Result<HttpResponse> {
            Ok(match self.0.get(url) {
                Some(bytes) => HttpResponse::ok(bytes.clone()),
                None => HttpResponse::status(404),
            })
        }
    }

    fn fake(url: &str, bytes: &[u8]) -> FakeClient {
        FakeClient(HashMap::from([(url.to_string(), bytes.to_vec())]))
    }

    #[test]
    fn test_download_file_streams_to_dest() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("downloads").join("foo.tar.gz");
        let body = vec![42u8; STREAM_BUFFER_SIZE * 2 + 17];
        let client = fake("https://example.test/foo.tar.gz", &body);

        let n = download_file(&client, "https://example.test/foo.tar.gz", &dest, None, &CancelToken::new())
            .unwrap();

        assert_eq!(n, body.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), body);
        assert!(!dir.path().join("downloads").join("foo.tar.gz.part").exists());
    }

    #[test]
    fn test_download_file_non_success() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing");
        let client = fake("https://example.test/other", b"");

        let err = download_file(&client, "https://example.test/missing", &dest, None, &CancelToken::new())
            .unwrap_err();
        match err {
            Error::Fetch { url, reason } => {
                assert_eq!(url, "https://example.test/missing");
                assert_eq!(reason, "HTTP 404");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn test_download_file_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("foo");
        let client = fake("https://example.test/foo", b"data");
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = download_file(&client, "https://example.test/foo", &dest, None, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!dest.exists());
        assert!(!dir.path().join("foo.part").exists());
    }

    #[test]
    fn test_cancelled_client_sends_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let client = RepositoryClient::new().unwrap().with_cancel(cancel);

        let err = client.get("http://127.0.0.1:9/never").unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_stalled_body_times_out() {
        use std::io::BufRead;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = io::BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 2 {
                line.clear();
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial")
                .unwrap();
            stream.flush().unwrap();
            std::thread::sleep(Duration::from_secs(3));
        });

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("stalled");
        let client = RepositoryClient::with_timeout(Duration::from_millis(300)).unwrap();
        let url = format!("http://{addr}/stalled");

        let started = std::time::Instant::now();
        let err = download_file(&client, &url, &dest, None, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!dest.exists());
        assert!(!dir.path().join("stalled.part").exists());
        server.join().unwrap();
    }

    #[test]
    fn test_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("artifact.bin");
        fs::write(&src, b"local bytes").unwrap();
        let url = url::Url::from_file_path(&src).unwrap().to_string();

        let client = RepositoryClient::new().unwrap();
        let mut body = Vec::new();
        get_success(&client, &url).unwrap().body.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"local bytes");

        let missing = url::Url::from_file_path(dir.path().join("nope")).unwrap().to_string();
        let response = client.get(&missing).unwrap();
        assert_eq!(response.status, 404);
    }
}
