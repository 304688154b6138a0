//! WebDAV client.
//!
//! Speaks just enough WebDAV over `reqwest` for uploads: `OPTIONS` to check
//! credentials, `PROPFIND` (depth 0) for existence, `MKCOL` for folders and
//! `PUT` for files. Every request carries HTTP basic auth.
//!
//! File bodies are sent as a single buffer so the request has a
//! `Content-Length`. The default Nginx setup shipped with Nextcloud rejects
//! chunked uploads.

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tracing::{debug, info};
use url::Url;

use super::{RemotePath, RemoteStore, StorageError};
use crate::config::WebDavConfig;

const PROPFIND: &str = "PROPFIND";
const MKCOL: &str = "MKCOL";

/// WebDAV session bound to one endpoint and one set of credentials.
pub struct WebDavStore {
    client: Client,
    endpoint: Url,
    username: String,
    password: String,
}

impl WebDavStore {
    /// Build a client without touching the network.
    pub fn new(config: &WebDavConfig) -> Result<Self, StorageError> {
        let endpoint = config
            .endpoint()
            .map_err(|e| StorageError::InvalidPath(e.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(StorageError::InvalidPath(endpoint.to_string()));
        }

        let client = Client::builder().build()?;

        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Build a client and verify the endpoint accepts our credentials.
    pub async fn connect(config: &WebDavConfig) -> Result<Self, StorageError> {
        let store = Self::new(config)?;
        store.ping().await?;
        info!("Connected to WebDAV endpoint {}", store.endpoint);
        Ok(store)
    }

    /// `OPTIONS` on the endpoint exactly as configured.
    pub async fn ping(&self) -> Result<(), StorageError> {
        let status = self
            .authed(Method::OPTIONS, self.endpoint.clone())
            .send()
            .await?
            .status();
        expect_success("OPTIONS", &RemotePath::new(""), status, &self.endpoint)
    }

    /// Absolute URL of `path` under the endpoint. Collections get a
    /// trailing slash.
    pub fn url_for(&self, path: &RemotePath, collection: bool) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidPath(self.endpoint.to_string()))?;
            segments.pop_if_empty().extend(path.segments());
            if collection && !path.is_root() {
                segments.push("");
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        path: &RemotePath,
        collection: bool,
    ) -> Result<RequestBuilder, StorageError> {
        let url = self.url_for(path, collection)?;
        Ok(self.authed(method, url))
    }

    fn authed(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn mkcol(&self, path: &RemotePath) -> Result<StatusCode, StorageError> {
        let response = self.request(dav_method(MKCOL)?, path, true)?.send().await?;
        Ok(response.status())
    }
}

#[async_trait]
impl RemoteStore for WebDavStore {
    async fn ensure_dir(&self, path: &RemotePath) -> Result<(), StorageError> {
        if path.is_root() {
            return Ok(());
        }

        let status = self.mkcol(path).await?;
        if mkcol_done(status) {
            return Ok(());
        }
        if status != StatusCode::CONFLICT {
            return expect_success(MKCOL, path, status, &self.endpoint);
        }

        // 409: a parent is missing, create the chain from the top.
        for ancestor in path.ancestors() {
            let status = self.mkcol(&ancestor).await?;
            if !mkcol_done(status) {
                expect_success(MKCOL, &ancestor, status, &self.endpoint)?;
            }
        }
        Ok(())
    }

    async fn exists(&self, path: &RemotePath) -> Result<bool, StorageError> {
        let status = self
            .request(dav_method(PROPFIND)?, path, false)?
            .header("Depth", HeaderValue::from_static("0"))
            .send()
            .await?
            .status();

        match status {
            StatusCode::MULTI_STATUS | StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(status_error(PROPFIND, path, other, &self.endpoint)),
        }
    }

    async fn write(&self, path: &RemotePath, content: Vec<u8>) -> Result<(), StorageError> {
        let status = self
            .request(Method::PUT, path, false)?
            .body(content)
            .send()
            .await?
            .status();
        expect_success("PUT", path, status, &self.endpoint)
    }
}

fn dav_method(name: &'static str) -> Result<Method, StorageError> {
    Method::from_bytes(name.as_bytes())
        .map_err(|_| StorageError::InvalidPath(format!("unsupported method {}", name)))
}

/// MKCOL answers 201 when it created the collection and 405 when the
/// collection already exists.
fn mkcol_done(status: StatusCode) -> bool {
    status == StatusCode::CREATED || status == StatusCode::METHOD_NOT_ALLOWED
}

fn expect_success(
    method: &'static str,
    path: &RemotePath,
    status: StatusCode,
    endpoint: &Url,
) -> Result<(), StorageError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(status_error(method, path, status, endpoint))
    }
}

fn status_error(
    method: &'static str,
    path: &RemotePath,
    status: StatusCode,
    endpoint: &Url,
) -> StorageError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return StorageError::Unauthorized(endpoint.to_string());
    }
    StorageError::Status {
        method,
        path: path.to_string(),
        status: status.as_u16(),
    }
}
