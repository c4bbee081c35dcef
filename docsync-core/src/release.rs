//! Umbrella release metadata: live from the GitHub API or from the catalog
//! snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Release snapshot as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub version: String,
    /// ISO date, `YYYY-MM-DD`.
    pub release_date: String,
    /// `Month D, YYYY`.
    pub release_date_formatted: String,
    pub release_url: String,
    pub release_name: String,
}

/// A release as returned by the API, with its notes and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub info: ReleaseInfo,
    pub body: String,
    pub published_at: Option<String>,
    pub is_prerelease: bool,
    pub is_draft: bool,
}

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("GitHub API request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("GitHub API request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("GitHub API response from {url} could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("release {tag} has an invalid published_at '{value}'")]
    InvalidDate { tag: String, value: String },
}

/// Source of the umbrella release metadata.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ReleaseProvider: Send + Sync {
    async fn latest_release(&self) -> Result<ReleaseInfo, ReleaseError>;
}

/// Serves the last-known-good snapshot; never fails.
#[derive(Debug, Clone)]
pub struct SnapshotReleaseProvider {
    snapshot: ReleaseInfo,
}

impl SnapshotReleaseProvider {
    pub fn new(snapshot: ReleaseInfo) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl ReleaseProvider for SnapshotReleaseProvider {
    async fn latest_release(&self) -> Result<ReleaseInfo, ReleaseError> {
        Ok(self.snapshot.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    name: Option<String>,
    html_url: String,
    published_at: Option<String>,
    body: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    draft: bool,
}

/// GitHub releases API client for one repository.
#[derive(Debug, Clone)]
pub struct GithubReleaseClient {
    client: Client,
    api_url: String,
    org: String,
    name: String,
    token: Option<String>,
}

impl GithubReleaseClient {
    /// Client authenticated with `GITHUB_TOKEN` or `GH_TOKEN` when either is set.
    pub fn new(api_url: &str, org: &str, name: &str) -> Result<Self, ReleaseError> {
        let token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok()
            .filter(|t| !t.is_empty());
        Self::with_token(api_url, org, name, token)
    }

    pub fn with_token(
        api_url: &str,
        org: &str,
        name: &str,
        token: Option<String>,
    ) -> Result<Self, ReleaseError> {
        let client = Client::builder()
            .user_agent(concat!("docsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ReleaseError::Request {
                url: api_url.to_string(),
                source,
            })?;
        if token.is_some() {
            info!("Using authenticated GitHub API requests");
        } else {
            info!("Using unauthenticated GitHub API requests (rate limited)");
        }
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            org: org.to_string(),
            name: name.to_string(),
            token,
        })
    }

    /// The latest published release, notes included.
    pub async fn latest(&self) -> Result<Release, ReleaseError> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_url, self.org, self.name
        );
        let release: ApiRelease = self.get_json(&url).await?;
        self.convert(release)
    }

    /// Up to `limit` recent releases, drafts and prereleases included.
    pub async fn fetch_releases(&self, limit: u32) -> Result<Vec<Release>, ReleaseError> {
        let url = format!(
            "{}/repos/{}/{}/releases?per_page={limit}",
            self.api_url, self.org, self.name
        );
        let releases: Vec<ApiRelease> = self.get_json(&url).await?;
        releases.into_iter().map(|r| self.convert(r)).collect()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ReleaseError> {
        info!(url = %url, "Fetching release metadata");
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github.v3+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = request.send().await.map_err(|source| {
            warn!(url = %url, error = %source, "GitHub API request failed");
            ReleaseError::Request {
                url: url.to_string(),
                source,
            }
        })?;
        let status = response.status();
        if status != StatusCode::OK {
            log_rate_limit(response.headers());
            error!(url = %url, status = status.as_u16(), "GitHub API request failed");
            return Err(ReleaseError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(|source| ReleaseError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn convert(&self, release: ApiRelease) -> Result<Release, ReleaseError> {
        let (release_date, release_date_formatted) = match &release.published_at {
            Some(value) => release_dates(&release.tag_name, value)?,
            None => (String::new(), String::new()),
        };
        let release_name = release
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{} {}", self.name, release.tag_name));
        Ok(Release {
            info: ReleaseInfo {
                version: release.tag_name,
                release_date,
                release_date_formatted,
                release_url: release.html_url,
                release_name,
            },
            body: release.body.unwrap_or_default(),
            published_at: release.published_at,
            is_prerelease: release.prerelease,
            is_draft: release.draft,
        })
    }
}

#[async_trait]
impl ReleaseProvider for GithubReleaseClient {
    async fn latest_release(&self) -> Result<ReleaseInfo, ReleaseError> {
        Ok(self.latest().await?.info)
    }
}

/// ISO date and `Month D, YYYY` for an RFC 3339 timestamp.
pub fn release_dates(tag: &str, published_at: &str) -> Result<(String, String), ReleaseError> {
    let parsed = DateTime::parse_from_rfc3339(published_at)
        .map_err(|_| ReleaseError::InvalidDate {
            tag: tag.to_string(),
            value: published_at.to_string(),
        })?
        .with_timezone(&Utc);
    Ok((
        parsed.format("%Y-%m-%d").to_string(),
        parsed.format("%B %-d, %Y").to_string(),
    ))
}

fn log_rate_limit(headers: &HeaderMap) {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Some(remaining) = header("x-ratelimit-remaining") {
        let resets_at = header("x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|t| t.to_rfc3339());
        warn!(remaining = %remaining, resets_at = ?resets_at, "GitHub API rate limit");
    }
}
