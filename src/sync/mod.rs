//! Transfer orchestrator.
//!
//! For each recipe link found on the source page:
//! 1. Normalize it into an absolute https URL and derive the filename
//! 2. Ensure today's folder exists on the remote store
//! 3. Skip if the file is already there
//! 4. Otherwise download the image and upload it
//!
//! Links are processed one after the other. A failed link is logged and
//! recorded; it never stops the run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::WebDavConfig;
use crate::fetch::{FetchError, ImageSource};
use crate::storage::{dated_folder, RemotePath, RemoteStore, StorageError};

/// Reasons a single link can fail.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Cannot parse URL '{link}': {reason}")]
    InvalidUrl { link: String, reason: String },

    #[error("URL '{0}' has no filename")]
    NoFilename(String),

    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Remote store error: {0}")]
    Storage(#[from] StorageError),
}

/// A candidate link ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLink {
    pub url: Url,
    pub filename: String,
}

/// Turn a page link into an https URL plus the filename it will be stored
/// under.
///
/// The source page emits scheme-relative links (`//images.ctfassets.net/…`),
/// so the scheme is forced to https whatever it was.
pub fn normalize_link(raw: &str) -> Result<NormalizedLink, LinkError> {
    let raw = raw.trim();
    let invalid = |reason: String| LinkError::InvalidUrl {
        link: raw.to_string(),
        reason,
    };

    if let Some(pos) = find_bad_escape(raw) {
        return Err(invalid(format!("invalid percent escape at byte {}", pos)));
    }

    let mut url = if let Some(rest) = raw.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest))
    } else {
        Url::parse(raw)
    }
    .map_err(|e| invalid(e.to_string()))?;

    if url.scheme() != "https" && url.set_scheme("https").is_err() {
        return Err(invalid(format!("cannot switch scheme '{}' to https", url.scheme())));
    }

    let filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|last| percent_decode_str(last).decode_utf8_lossy().into_owned())
        // An encoded "%2F" decodes to '/'; keep only the basename.
        .map(|decoded| match decoded.rsplit_once('/') {
            Some((_, base)) => base.to_string(),
            None => decoded,
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .ok_or_else(|| LinkError::NoFilename(raw.to_string()))?;

    Ok(NormalizedLink { url, filename })
}

/// Byte offset of the first '%' not followed by two hex digits.
fn find_bad_escape(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    bytes.iter().enumerate().find_map(|(i, &b)| {
        if b != b'%' {
            return None;
        }
        let valid = bytes
            .get(i + 1..i + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        (!valid).then_some(i)
    })
}

/// Terminal state of one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Downloaded and written to the store
    Uploaded { path: RemotePath, bytes: usize },
    /// Already present on the store, nothing fetched
    Skipped { path: RemotePath },
    Failed { reason: String },
}

/// Outcome of processing one link.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub link: String,
    pub status: LinkStatus,
}

impl LinkOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, LinkStatus::Failed { .. })
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<LinkOutcome>,
    pub duration: Duration,
}

impl RunReport {
    pub fn uploaded(&self) -> usize {
        self.count(|s| matches!(s, LinkStatus::Uploaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, LinkStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, LinkStatus::Failed { .. }))
    }

    /// At least one link processed and none failed.
    pub fn is_success(&self) -> bool {
        !self.outcomes.is_empty() && self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&LinkStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Source of "now" for naming the dated folder.
pub type Clock = fn() -> DateTime<Local>;

/// Where uploads go: base folder plus the strftime pattern of the daily
/// subfolder.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub folder: String,
    pub folder_format: String,
}

impl From<&WebDavConfig> for UploadTarget {
    fn from(config: &WebDavConfig) -> Self {
        Self {
            folder: config.folder.clone(),
            folder_format: config.folder_format.clone(),
        }
    }
}

/// Sequential download/upload pipeline.
pub struct Orchestrator {
    target: UploadTarget,
    source: Arc<dyn ImageSource>,
    store: Arc<dyn RemoteStore>,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        target: UploadTarget,
        source: Arc<dyn ImageSource>,
        store: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            target,
            source,
            store,
            clock: Local::now,
        }
    }

    /// Replace the wall clock used for folder names.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Today's folder. Evaluated per link, so a run crossing midnight
    /// spreads over two folders.
    pub fn current_folder(&self) -> RemotePath {
        dated_folder(&self.target.folder, &self.target.folder_format, &(self.clock)())
    }

    /// Process every link in order.
    pub async fn run(&self, links: &[String]) -> RunReport {
        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(links.len());

        for link in links {
            outcomes.push(self.process_link(link).await);
        }

        let report = RunReport {
            outcomes,
            duration: start.elapsed(),
        };
        info!(
            "Run finished: {} uploaded, {} skipped, {} failed in {:?}",
            report.uploaded(),
            report.skipped(),
            report.failed(),
            report.duration
        );
        report
    }

    /// Process one link; failures are logged and captured in the outcome.
    pub async fn process_link(&self, link: &str) -> LinkOutcome {
        let status = match self.transfer(link).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Cannot download '{}': {}", link, e);
                LinkStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        LinkOutcome {
            link: link.to_string(),
            status,
        }
    }

    async fn transfer(&self, link: &str) -> Result<LinkStatus, LinkError> {
        let normalized = normalize_link(link)?;

        let folder = self.current_folder();
        self.store.ensure_dir(&folder).await?;

        let path = folder.join(&normalized.filename);
        if self.store.exists(&path).await? {
            info!("File {} already downloaded", normalized.filename);
            return Ok(LinkStatus::Skipped { path });
        }

        let content = self.source.download(&normalized.url).await?;
        let bytes = content.len();
        self.store.write(&path, content).await?;

        info!("Downloaded {} ({} bytes) to {}", normalized.filename, bytes, path);
        Ok(LinkStatus::Uploaded { path, bytes })
    }
}
