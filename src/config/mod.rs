//! Configuration loading and validation.
//!
//! The configuration document is TOML with a `[scraper]` table describing the
//! source page and a `[webdav]` table describing the upload destination.
//! Missing keys and empty strings are treated the same way.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::parse_duration;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Key {0} is missing from configuration file")]
    MissingKey(&'static str),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Source page configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Page listing this week's recipes
    #[serde(default)]
    pub url: String,

    /// Per-request timeout, e.g. "60s" or "2m"
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> String {
    format!("{}s", DEFAULT_TIMEOUT_SECS)
}

fn default_user_agent() -> String {
    format!("recipe-box-sync/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl ScraperConfig {
    /// Request timeout, falling back to the default when unparseable.
    pub fn timeout(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn page_url(&self) -> Result<Url, ConfigError> {
        parse_url("scraper.url", &self.url)
    }
}

/// WebDAV destination configuration.
#[derive(Clone, Default, Deserialize)]
pub struct WebDavConfig {
    /// Server endpoint, e.g. https://cloud.example.org/remote.php/dav/files/me/
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Base folder under the endpoint
    #[serde(default)]
    pub folder: String,

    /// strftime pattern naming the per-day subfolder
    #[serde(default)]
    pub folder_format: String,
}

impl WebDavConfig {
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        parse_url("webdav.url", &self.url)
    }
}

impl fmt::Debug for WebDavConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("folder", &self.folder)
            .field("folder_format", &self.folder_format)
            .finish()
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,

    #[serde(default)]
    pub webdav: WebDavConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 6] = [
            ("scraper.url", &self.scraper.url),
            ("webdav.url", &self.webdav.url),
            ("webdav.username", &self.webdav.username),
            ("webdav.password", &self.webdav.password),
            ("webdav.folder", &self.webdav.folder),
            ("webdav.folder_format", &self.webdav.folder_format),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingKey(key));
            }
        }

        self.scraper.page_url()?;
        self.webdav.endpoint()?;

        match parse_duration(&self.scraper.timeout) {
            Some(d) if !d.is_zero() => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "scraper.timeout must be a positive duration, got {:?}",
                    self.scraper.timeout
                )));
            }
        }

        let bad_pattern = StrftimeItems::new(&self.webdav.folder_format)
            .any(|item| matches!(item, Item::Error));
        if bad_pattern {
            return Err(ConfigError::ValidationError(format!(
                "webdav.folder_format is not a valid date pattern: {:?}",
                self.webdav.folder_format
            )));
        }

        Ok(())
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim())
        .map_err(|e| ConfigError::ValidationError(format!("{} is not a valid URL: {}", key, e)))
}
