//! Scoring engine. Turns a job description plus repository signals into a
//! constrained verdict.
//!
//! Transport-level failures (timeouts, 429, 5xx) are returned as
//! `ScoreError::Transient` so the queue retries the candidate. A well-formed
//! but unusable answer degrades to `needs_review` instead.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::github::signals::truncate_chars;
use crate::github::RepoSignals;
use crate::llm_client::prompts::{fill_template, JSON_ONLY_SYSTEM};
use crate::llm_client::{CallOptions, LlmClient};
use crate::models::ScreeningStatus;

pub mod prompts;
pub mod rules;
pub mod verdict;

pub use verdict::{parse_verdict, Verdict};

use prompts::{SCORING_PROMPT_TEMPLATE, SCORING_SYSTEM};

/// Job descriptions are cut to this many characters in the prompt.
pub const JD_MAX_CHARS: usize = 2000;
const README_PROMPT_CHARS: usize = 3000;

/// Low temperature keeps repeated scorings of the same repository stable.
const SCORING_OPTIONS: CallOptions = CallOptions {
    max_tokens: 500,
    temperature: Some(0.2),
};

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("transient scoring failure: {0}")]
    Transient(String),
}

#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(
        &self,
        candidate_name: &str,
        job_description: &str,
        signals: &RepoSignals,
    ) -> Result<Verdict, ScoreError>;
}

/// Rule pre-screen followed by a Claude call. Without an API key every
/// candidate the rules cannot decide lands in `needs_review`.
pub struct LlmScorer {
    llm: Option<LlmClient>,
}

impl LlmScorer {
    pub fn new(llm: Option<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Scorer for LlmScorer {
    async fn score(
        &self,
        candidate_name: &str,
        job_description: &str,
        signals: &RepoSignals,
    ) -> Result<Verdict, ScoreError> {
        if let Some(verdict) = rules::pre_screen(signals) {
            info!(
                "Rule pre-screen decided {}/{}: {:?}",
                signals.owner, signals.repo, verdict.status
            );
            return Ok(verdict);
        }

        let Some(llm) = &self.llm else {
            warn!("ANTHROPIC_API_KEY not configured, skipping AI analysis");
            return Ok(Verdict {
                status: ScreeningStatus::NeedsReview,
                signals: vec!["API Key Missing".to_string(), "Analysis skipped".to_string()],
                explanation: "AI analysis could not be performed because the API key is missing."
                    .to_string(),
            });
        };

        let prompt = build_scoring_prompt(candidate_name, job_description, signals);
        let system = build_system_prompt();

        let text = match llm.call_text(&prompt, &system, SCORING_OPTIONS).await {
            Ok(text) => text,
            Err(e) if e.is_transient() => return Err(ScoreError::Transient(e.to_string())),
            Err(e) => {
                warn!("Scoring call rejected by provider: {e}");
                return Ok(Verdict::needs_review(
                    "AI Analysis Failed",
                    "An error occurred during AI analysis. Please review manually.",
                ));
            }
        };

        Ok(rules::enforce_priority(signals, parse_verdict(&text)))
    }
}

fn build_system_prompt() -> String {
    let min_commits = rules::MIN_COMMITS.to_string();
    let low_activity = rules::LOW_ACTIVITY_EVENTS.to_string();
    let healthy_commits = rules::HEALTHY_COMMITS.to_string();
    let high_activity = rules::HIGH_ACTIVITY_EVENTS.to_string();
    let very_high_activity = rules::VERY_HIGH_ACTIVITY_EVENTS.to_string();

    let policy = fill_template(
        SCORING_SYSTEM,
        &[
            ("min_commits", &min_commits),
            ("low_activity", &low_activity),
            ("healthy_commits", &healthy_commits),
            ("high_activity", &high_activity),
            ("very_high_activity", &very_high_activity),
        ],
    );
    format!("{policy}\n{JSON_ONLY_SYSTEM}")
}

/// Fills the user-message template. Deterministic for identical inputs.
pub fn build_scoring_prompt(
    candidate_name: &str,
    job_description: &str,
    signals: &RepoSignals,
) -> String {
    let commits_json = json!(signals
        .commits
        .iter()
        .map(|c| json!({
            "message": c.message,
            "author": c.author_name,
            "authorLogin": c.author_login,
            "authorId": c.author_id,
            "date": c.date,
        }))
        .collect::<Vec<_>>())
    .to_string();

    let owner = &signals.owner_profile;
    let owner_id = owner
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let description = if signals.description.is_empty() {
        "(none)"
    } else {
        signals.description.as_str()
    };
    let repository = format!("{}/{}", signals.owner, signals.repo);
    let stars = signals.stars.to_string();
    let forks = signals.forks.to_string();
    let open_issues = signals.open_issues.to_string();
    let commit_count = signals.commit_count().to_string();
    let account_age_days = owner.account_age_days.to_string();
    let public_repos = owner.public_repos.to_string();
    let followers = owner.followers.to_string();
    let recent_events = owner.recent_events.to_string();

    fill_template(
        SCORING_PROMPT_TEMPLATE,
        &[
            ("candidate_name", candidate_name),
            ("job_description", truncate_chars(job_description, JD_MAX_CHARS)),
            ("repository", &repository),
            ("description", description),
            ("stars", &stars),
            ("forks", &forks),
            ("open_issues", &open_issues),
            ("commit_count", &commit_count),
            ("readme", truncate_chars(&signals.readme, README_PROMPT_CHARS)),
            ("commits_json", &commits_json),
            ("owner_login", &owner.login),
            ("owner_id", &owner_id),
            ("owner_type", &owner.account_type),
            ("account_age_days", &account_age_days),
            ("public_repos", &public_repos),
            ("followers", &followers),
            ("recent_events", &recent_events),
        ],
    )
}
