//! # Recipe Box Sync
//!
//! Copies recipe-card images published on a recipe-box vendor's web page
//! into a dated folder on a WebDAV server. Meant to run once a day from cron;
//! files already present on the server are skipped, so a failed run is
//! simply retried by the next one.
//!
//! ## Architecture
//!
//! - **config**: Configuration loading and validation
//! - **fetch**: HTTP client for the source page and image downloads
//! - **scrape**: Recipe link extraction from the source page
//! - **storage**: Remote store abstraction and the WebDAV client
//! - **sync**: Per-link transfer orchestration and run reporting

pub mod config;
pub mod fetch;
pub mod scrape;
pub mod storage;
pub mod sync;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "6h", "30m", "90s").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.trim().parse().ok()?;
    Some(Duration::from_secs(num.checked_mul(multiplier)?))
}
