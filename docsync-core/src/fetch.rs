//! Retrieval of raw documents from a repository's raw-content host.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// A fetched document as reported by the fetch host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// The document path the host delivered, relative to the base URL.
    pub filename: String,
    pub content: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid document URL {base_url} + {path}: {source}")]
    InvalidUrl {
        base_url: String,
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{url} not found")]
    NotFound { url: String },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn url(&self) -> String {
        match self {
            FetchError::InvalidUrl { base_url, path, .. } => format!("{base_url}{path}"),
            FetchError::NotFound { url }
            | FetchError::Status { url, .. }
            | FetchError::Request { url, .. } => url.clone(),
        }
    }
}

/// Fetches one document relative to a source base URL.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, base_url: &str, path: &str) -> Result<FetchedDocument, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

/// Joins `path` onto `base_url`, which is treated as a directory.
pub fn document_url(base_url: &str, path: &str) -> Result<Url, FetchError> {
    let invalid = |source| FetchError::InvalidUrl {
        base_url: base_url.to_string(),
        path: path.to_string(),
        source,
    };
    let base = if base_url.ends_with('/') {
        Url::parse(base_url)
    } else {
        Url::parse(&format!("{base_url}/"))
    }
    .map_err(invalid)?;
    base.join(path.trim_start_matches('/')).map_err(invalid)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, base_url: &str, path: &str) -> Result<FetchedDocument, FetchError> {
        let url = document_url(base_url, path)?;
        debug!(url = %url, "Fetching document");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                warn!(url = %url, "Document not found");
                return Err(FetchError::NotFound {
                    url: url.to_string(),
                });
            }
            status => {
                warn!(url = %url, status = status.as_u16(), "Unexpected status fetching document");
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
        }
        let content = response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        Ok(FetchedDocument {
            filename: path.to_string(),
            content,
            url: url.to_string(),
        })
    }
}
