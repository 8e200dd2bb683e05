//! Repository and owner signals from the GitHub REST API.
//!
//! Five requests per submission run concurrently. A 4xx on the repository
//! itself is permanent (missing or private repo); rate limits, 5xx and
//! network errors are retried with exponential backoff and then surfaced as
//! transient so the task queue can redeliver.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header::HeaderMap, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod signals;

pub use signals::{parse_repo_url, CommitSignal, OwnerSignals, RepoRef, RepoSignals};

use signals::{decode_readme, parse_commits, parse_owner_profile, parse_repo_info};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "triage-api/0.1";
/// Size of the recent-commit window fed to scoring.
const COMMIT_WINDOW: u32 = 30;
/// Public events are counted from one page; the count is capped at this.
const EVENTS_PAGE_SIZE: u32 = 100;
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Invalid URL, or the repository is missing/private. Never retried.
    #[error("repository not accessible: {0}")]
    NotFound(String),

    /// Network failure or rate limit that survived local retries.
    #[error("transient GitHub failure: {0}")]
    Transient(String),
}

#[async_trait]
pub trait SignalFetcher: Send + Sync {
    async fn fetch(&self, repo_url: &str) -> Result<RepoSignals, FetchError>;
}

/// Outcome of one GET after retries.
enum ApiReply {
    Found(Value),
    /// Non-retryable HTTP status (404, 409, 451, ...).
    Missing(u16),
}

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_base: String,
    token: Option<String>,
    retry_base: Duration,
}

impl GithubClient {
    pub fn new(api_base: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            retry_base: Duration::from_secs(1),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    /// GET with retry on transient failures. Backoff: 1s, 2s.
    async fn get_json(&self, path: &str) -> Result<ApiReply, FetchError> {
        let url = format!("{}{path}", self.api_base);
        let mut last_error = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = self.retry_base * (1 << (attempt - 1));
                warn!(
                    "GitHub request {} attempt {} failed ({}), retrying after {}ms",
                    path,
                    attempt,
                    last_error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .get(&url)
                .header("User-Agent", USER_AGENT)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28");
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = format!("request failed: {e}");
                    continue;
                }
            };

            let status = response.status();
            if is_transient(status, response.headers()) {
                last_error = format!("HTTP {status}");
                continue;
            }
            if !status.is_success() {
                debug!("GitHub request {path} returned {status}");
                return Ok(ApiReply::Missing(status.as_u16()));
            }

            match response.json::<Value>().await {
                Ok(body) => return Ok(ApiReply::Found(body)),
                Err(e) => {
                    last_error = format!("unreadable body: {e}");
                    continue;
                }
            }
        }

        Err(FetchError::Transient(format!(
            "{path}: {last_error} after {MAX_ATTEMPTS} attempts"
        )))
    }
}

/// 429, 5xx, and 403 with an exhausted rate-limit budget are worth retrying.
fn is_transient(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0")
}

#[async_trait]
impl SignalFetcher for GithubClient {
    async fn fetch(&self, repo_url: &str) -> Result<RepoSignals, FetchError> {
        let repo_ref = parse_repo_url(repo_url).ok_or_else(|| {
            FetchError::NotFound(format!("'{repo_url}' is not a GitHub repository URL"))
        })?;
        let RepoRef { owner, repo } = &repo_ref;
        let base = format!("/repos/{owner}/{repo}");
        let readme_path = format!("{base}/readme");
        let commits_path = format!("{base}/commits?per_page={COMMIT_WINDOW}");
        let profile_path = format!("/users/{owner}");
        let events_path = format!("/users/{owner}/events/public?per_page={EVENTS_PAGE_SIZE}");

        let (info, readme, commits, profile, events) = tokio::join!(
            self.get_json(&base),
            self.get_json(&readme_path),
            self.get_json(&commits_path),
            self.get_json(&profile_path),
            self.get_json(&events_path),
        );

        // The repository reply decides permanence before anything else.
        let info = match info? {
            ApiReply::Found(raw) => parse_repo_info(&raw),
            ApiReply::Missing(status) => {
                return Err(FetchError::NotFound(format!(
                    "{} returned HTTP {status}",
                    repo_ref.full_name()
                )))
            }
        };

        let readme = match readme? {
            ApiReply::Found(raw) => decode_readme(&raw),
            ApiReply::Missing(_) => String::new(),
        };
        // 409 means the repository has no commits at all.
        let commits = match commits? {
            ApiReply::Found(raw) => parse_commits(&raw),
            ApiReply::Missing(_) => Vec::new(),
        };
        let profile = match profile? {
            ApiReply::Found(raw) => Some(raw),
            ApiReply::Missing(_) => None,
        };
        let events = match events? {
            ApiReply::Found(raw) => Some(raw),
            ApiReply::Missing(_) => None,
        };

        let owner_profile = parse_owner_profile(profile.as_ref(), events.as_ref(), &info, Utc::now());

        debug!(
            "Fetched {}: {} commits, {} owner events",
            repo_ref.full_name(),
            commits.len(),
            owner_profile.recent_events
        );

        Ok(RepoSignals {
            owner: owner.clone(),
            repo: repo.clone(),
            description: info.description,
            stars: info.stars,
            forks: info.forks,
            open_issues: info.open_issues,
            readme,
            commits,
            owner_profile,
        })
    }
}
