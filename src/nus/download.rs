// nus/download.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Implements downloading files from the CDN to disk, with retries and size verification.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::{debug, warn};
use reqwest::StatusCode;
use thiserror::Error;

/// Identifies the client to the CDN. Some mirrors refuse requests without a browser User-Agent.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:102.0) Gecko/20100101 Firefox/102.0";
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_CHUNK_SIZE: usize = 0x10000;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(120);
/// How long a request may go without receiving anything before the attempt is abandoned.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// A failed attempt at fetching a file. Every variant is worth retrying.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("the server returned 404 Not Found")]
    NotFound,
    #[error("the server returned HTTP status {0}")]
    Status(u16),
    #[error("the connection failed")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("the downloaded file is {actual} bytes, but {expected} bytes were expected")]
    SizeMismatch { expected: u64, actual: u64 },
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not download `{url}` after {attempts} attempt(s)")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Option<FetchError>,
    },
    #[error("could not write to `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The source that file data is fetched from. The only real implementation is [`HttpTransport`],
/// but anything that can hand back a reader for a URL works.
pub trait Transport {
    fn get(&self, url: &str) -> Result<Box<dyn Read>, FetchError>;
}

/// Fetches files over HTTP(S) with a blocking reqwest client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// `read_timeout` bounds the wait for the response headers and every read of the body on its
    /// own, so a stalled server fails the attempt while a large file can take as long as it needs.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Box<dyn Read>, FetchError> {
        let response = self.client.get(url).send().map_err(|e| FetchError::Transport(Box::new(e)))?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            status if !status.is_success() => Err(FetchError::Status(status.as_u16())),
            _ => Ok(Box::new(response)),
        }
    }
}

/// Receives progress updates from a [`Downloader`]. None of these affect whether a download
/// succeeds, so every method does nothing by default.
pub trait DownloadObserver {
    /// A retry is starting. `attempt` is counted from 1.
    fn on_attempt(&self, _attempt: u32, _retry_count: u32) {}
    /// An existing file already had the expected size, so nothing was downloaded.
    fn on_skip(&self, _path: &Path, _size: u64) {}
    fn on_progress(&self, _downloaded: u64, _expected: u64) {}
    fn on_complete(&self, _path: &Path, _size: u64) {}
}

/// A [`DownloadObserver`] that reports nothing.
pub struct Quiet;

impl DownloadObserver for Quiet {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloaderConfig {
    /// The maximum number of attempts made for each file.
    pub retry_count: u32,
    pub chunk_size: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        DownloaderConfig {
            retry_count: DEFAULT_RETRY_COUNT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A single file to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
    /// When set, the file on disk must end up exactly this size.
    pub expected_size: Option<u64>,
    /// Treat a 404 as success without creating a file, for files that may not exist.
    pub ignore_not_found: bool,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        DownloadTask {
            url: url.into(),
            destination: destination.into(),
            expected_size: None,
            ignore_not_found: false,
        }
    }

    pub fn expect_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    pub fn optional(mut self) -> Self {
        self.ignore_not_found = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was downloaded; holds the number of bytes written.
    Downloaded(u64),
    /// A complete file was already on disk; holds its size.
    Skipped(u64),
    /// The file does not exist on the server, and the task allowed that.
    NotFound,
}

// Errors from a single attempt, split by whether retrying can help.
enum AttemptError {
    Retry(FetchError),
    Local(io::Error),
}

impl From<FetchError> for AttemptError {
    fn from(e: FetchError) -> Self {
        AttemptError::Retry(e)
    }
}

pub struct Downloader<T: Transport> {
    transport: T,
    config: DownloaderConfig,
    observer: Box<dyn DownloadObserver>,
}

impl<T: Transport> Downloader<T> {
    pub fn new(transport: T, config: DownloaderConfig) -> Self {
        Downloader {
            transport,
            config,
            observer: Box::new(Quiet),
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn DownloadObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Downloads the file described by `task`, making up to `retry_count` attempts. Each attempt
    /// starts over from the beginning of the file.
    pub fn fetch(&self, task: &DownloadTask) -> Result<FetchOutcome, DownloadError> {
        let mut last = None;
        for attempt in 1..=self.config.retry_count {
            if attempt > 1 {
                self.observer.on_attempt(attempt, self.config.retry_count);
            }
            match self.attempt(task) {
                Ok(outcome) => return Ok(outcome),
                Err(AttemptError::Retry(FetchError::NotFound)) if task.ignore_not_found => {
                    debug!("{} does not exist, skipping it", task.url);
                    return Ok(FetchOutcome::NotFound);
                },
                Err(AttemptError::Retry(e)) => {
                    warn!("Failed to download file {}: {}", task.url, e);
                    last = Some(e);
                },
                Err(AttemptError::Local(source)) => {
                    return Err(DownloadError::Io { path: task.destination.clone(), source });
                },
            }
        }
        Err(DownloadError::RetriesExhausted {
            url: task.url.clone(),
            attempts: self.config.retry_count,
            last,
        })
    }

    fn attempt(&self, task: &DownloadTask) -> Result<FetchOutcome, AttemptError> {
        let disk_size = fs::metadata(&task.destination).ok().filter(|m| m.is_file()).map(|m| m.len());
        debug!("Downloading {} (expected size {:?}, size on disk {:?})", task.destination.display(), task.expected_size, disk_size);
        if let Some(expected) = task.expected_size {
            if disk_size == Some(expected) {
                self.observer.on_skip(&task.destination, expected);
                return Ok(FetchOutcome::Skipped(expected));
            }
        }
        let mut body = self.transport.get(&task.url)?;
        // Truncating here means that an interrupted download leaves a short file behind, which the
        // size check on the next run will not mistake for a complete one.
        let mut out = File::create(&task.destination).map_err(AttemptError::Local)?;
        let mut buf = vec![0u8; self.config.chunk_size.max(1)];
        let mut downloaded: u64 = 0;
        loop {
            let read = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FetchError::Transport(Box::new(e)).into()),
            };
            out.write_all(&buf[..read]).map_err(AttemptError::Local)?;
            downloaded += read as u64;
            if let Some(expected) = task.expected_size {
                self.observer.on_progress(downloaded, expected);
            }
        }
        out.flush().map_err(AttemptError::Local)?;
        drop(out);
        if let Some(expected) = task.expected_size {
            let actual = fs::metadata(&task.destination).map_err(AttemptError::Local)?.len();
            if actual != expected {
                return Err(FetchError::SizeMismatch { expected, actual }.into());
            }
        }
        self.observer.on_complete(&task.destination, downloaded);
        Ok(FetchOutcome::Downloaded(downloaded))
    }
}
