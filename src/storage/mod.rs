//! Remote store operations.
//!
//! Uploads land on a remote filesystem reached over WebDAV. The orchestrator
//! only needs three operations, captured by the [`RemoteStore`] trait, so
//! tests can swap in an in-memory store.

pub mod webdav;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use thiserror::Error;

pub use webdav::WebDavStore;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Authentication rejected by {0}")]
    Unauthorized(String),

    #[error("{method} {path} failed with status {status}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
    },
}

/// A '/'-separated path relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath(String);

impl RemotePath {
    /// Build a path, dropping empty segments so "a//b/" becomes "a/b".
    pub fn new(path: &str) -> Self {
        Self(Self::normalize(path))
    }

    /// Append a segment (or several, if it contains '/').
    pub fn join(&self, segment: &str) -> Self {
        Self::new(&format!("{}/{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Every ancestor, shortest first, ending with the path itself.
    pub fn ancestors(&self) -> Vec<RemotePath> {
        let mut acc = String::new();
        self.segments()
            .map(|segment| {
                if !acc.is_empty() {
                    acc.push('/');
                }
                acc.push_str(segment);
                RemotePath(acc.clone())
            })
            .collect()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    fn normalize(path: &str) -> String {
        path.split('/')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// `{base}/{now formatted with pattern}`.
///
/// The pattern must already be validated; see `AppConfig::validate`.
pub fn dated_folder<Tz>(base: &str, pattern: &str, now: &DateTime<Tz>) -> RemotePath
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    RemotePath::new(base).join(&now.format(pattern).to_string())
}

/// Minimal remote filesystem used as the upload destination.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create the directory and any missing parents. Idempotent.
    async fn ensure_dir(&self, path: &RemotePath) -> Result<(), StorageError>;

    /// Whether a file or directory exists at `path`.
    async fn exists(&self, path: &RemotePath) -> Result<bool, StorageError>;

    /// Upload `content` to `path`, replacing anything there.
    async fn write(&self, path: &RemotePath, content: Vec<u8>) -> Result<(), StorageError>;
}
