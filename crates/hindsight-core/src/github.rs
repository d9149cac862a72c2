use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::info;

/// Concurrent outbound GitHub calls across all requests.
const MAX_CONCURRENT_FETCHES: usize = 5;

#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("GitHub token not configured; set GITHUB_TOKEN")]
    NotConfigured,
    #[error("invalid pull request URL: {0}")]
    InvalidUrl(String),
    #[error("GitHub unreachable: {0}")]
    Unreachable(String),
    #[error("GitHub API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
}

/// Coordinates of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    /// Parse a URL of the form `https://github.com/{owner}/{repo}/pull/{number}`.
    pub fn parse_url(url: &str) -> Result<Self, FetchError> {
        let invalid = || FetchError::InvalidUrl(url.to_string());

        let rest = url
            .strip_prefix("https://github.com/")
            .ok_or_else(invalid)?;
        let mut parts = rest.split('/');
        let owner = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let repo = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let pull = parts.next().ok_or_else(invalid)?;
        if pull != "pull" {
            return Err(invalid());
        }
        let number = parts
            .next()
            .and_then(|n| n.parse::<u64>().ok())
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

/// Source of pull-request diffs. Returns the raw unified diff text plus a
/// representative file path (the first file the diff touches).
#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn fetch_pr(&self, pr: &PullRequestRef) -> Result<(String, String), FetchError>;
}

/// GitHub REST implementation, using the diff media type on the pull
/// request endpoint.
pub struct GithubDiffSource {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    permits: Arc<Semaphore>,
}

impl GithubDiffSource {
    pub fn new(token: Option<String>) -> Self {
        Self::with_api_base("https://api.github.com", token)
    }

    /// Separate constructor so tests can point at a local server.
    pub fn with_api_base(api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            token,
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES)),
        }
    }
}

#[async_trait]
impl DiffSource for GithubDiffSource {
    async fn fetch_pr(&self, pr: &PullRequestRef) -> Result<(String, String), FetchError> {
        let token = self.token.as_ref().ok_or(FetchError::NotConfigured)?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_base, pr.owner, pr.repo, pr.number
        );
        info!(%url, "fetching pull request diff");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3.diff")
            .header("User-Agent", "hindsight")
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api { status, body });
        }

        let diff = response
            .text()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let primary_path = first_file_path(&diff).unwrap_or_else(|| "unknown".to_string());
        Ok((diff, primary_path))
    }
}

/// The new-side path of the first file block in a unified diff.
fn first_file_path(diff: &str) -> Option<String> {
    diff.lines()
        .find(|l| l.starts_with("+++ ") && !l.ends_with("/dev/null"))
        .map(|l| {
            let path = &l[4..];
            path.strip_prefix("b/").unwrap_or(path).to_string()
        })
}
