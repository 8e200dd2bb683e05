//! Repository-hygiene signals and the pure parsing of GitHub API payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// README text is cut to this many characters to bound prompt size.
pub const README_MAX_CHARS: usize = 8000;
/// Commit messages are reduced to their first line and cut to this length.
const COMMIT_MESSAGE_MAX_CHARS: usize = 200;

/// Owner/repo pair parsed from a candidate's submission URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitSignal {
    pub message: String,
    /// Free-text git author name. Not used for identity checks.
    pub author_name: String,
    /// Linked GitHub account, when the commit email maps to one.
    pub author_login: Option<String>,
    pub author_id: Option<i64>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnerSignals {
    pub login: String,
    pub id: Option<i64>,
    /// "User" or "Organization".
    pub account_type: String,
    pub account_age_days: i64,
    pub public_repos: u64,
    pub followers: u64,
    /// Public events on the owner's account, capped at the API page size.
    pub recent_events: u32,
}

/// Everything the scoring engine gets to see about a submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoSignals {
    pub owner: String,
    pub repo: String,
    pub description: String,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub readme: String,
    pub commits: Vec<CommitSignal>,
    pub owner_profile: OwnerSignals,
}

impl RepoSignals {
    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// URL parsing
// ────────────────────────────────────────────────────────────────────────────

/// Parses `https://github.com/<owner>/<repo>[.git][/...]`.
/// Anything else (other hosts, missing segments) yields `None`.
pub fn parse_repo_url(raw: &str) -> Option<RepoRef> {
    let raw = raw.trim();
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let url = Url::parse(&with_scheme).ok()?;

    match url.host_str()? {
        "github.com" | "www.github.com" => {}
        _ => return None,
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?.to_string();
    let repo = segments.next()?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo).to_string();

    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(RepoRef { owner, repo })
}

// ────────────────────────────────────────────────────────────────────────────
// Payload parsing
// ────────────────────────────────────────────────────────────────────────────

/// Cuts a string to at most `max` characters without splitting a char.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Fields of `GET /repos/{owner}/{repo}` that feed the signals.
pub struct RepoInfo {
    pub description: String,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub owner_login: String,
    pub owner_id: Option<i64>,
    pub owner_type: String,
}

pub fn parse_repo_info(raw: &Value) -> RepoInfo {
    let owner = raw.get("owner");
    RepoInfo {
        description: raw
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        stars: raw.get("stargazers_count").and_then(Value::as_u64).unwrap_or(0),
        forks: raw.get("forks_count").and_then(Value::as_u64).unwrap_or(0),
        open_issues: raw.get("open_issues_count").and_then(Value::as_u64).unwrap_or(0),
        owner_login: owner
            .and_then(|o| o.get("login"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        owner_id: owner.and_then(|o| o.get("id")).and_then(Value::as_i64),
        owner_type: owner
            .and_then(|o| o.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("User")
            .to_string(),
    }
}

/// Decodes the base64 `content` of `GET /repos/{owner}/{repo}/readme`.
pub fn decode_readme(raw: &Value) -> String {
    let Some(content) = raw.get("content").and_then(Value::as_str) else {
        return String::new();
    };
    // GitHub wraps the base64 payload at 60 columns.
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    match STANDARD.decode(compact) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            truncate_chars(&text, README_MAX_CHARS).to_string()
        }
        Err(e) => {
            tracing::debug!("README content is not valid base64: {e}");
            String::new()
        }
    }
}

pub fn parse_commits(raw: &Value) -> Vec<CommitSignal> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| {
            let commit = item.get("commit");
            let git_author = commit.and_then(|c| c.get("author"));
            let account = item.get("author").filter(|a| !a.is_null());

            let message = commit
                .and_then(|c| c.get("message"))
                .and_then(Value::as_str)
                .and_then(|m| m.lines().next())
                .unwrap_or_default();

            CommitSignal {
                message: truncate_chars(message, COMMIT_MESSAGE_MAX_CHARS).to_string(),
                author_name: git_author
                    .and_then(|a| a.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                author_login: account
                    .and_then(|a| a.get("login"))
                    .and_then(Value::as_str)
                    .map(String::from),
                author_id: account.and_then(|a| a.get("id")).and_then(Value::as_i64),
                date: git_author
                    .and_then(|a| a.get("date"))
                    .and_then(Value::as_str)
                    .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                    .map(|d| d.with_timezone(&Utc)),
            }
        })
        .collect()
}

/// Builds owner signals from `GET /users/{owner}` plus the event count.
pub fn parse_owner_profile(
    profile: Option<&Value>,
    events: Option<&Value>,
    info: &RepoInfo,
    now: DateTime<Utc>,
) -> OwnerSignals {
    let created_at = profile
        .and_then(|p| p.get("created_at"))
        .and_then(Value::as_str)
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.with_timezone(&Utc));

    OwnerSignals {
        login: info.owner_login.clone(),
        id: info.owner_id,
        account_type: info.owner_type.clone(),
        account_age_days: created_at
            .map(|c| (now - c).num_days().max(0))
            .unwrap_or(0),
        public_repos: profile
            .and_then(|p| p.get("public_repos"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        followers: profile
            .and_then(|p| p.get("followers"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        recent_events: events
            .and_then(Value::as_array)
            .map(|e| e.len() as u32)
            .unwrap_or(0),
    }
}
