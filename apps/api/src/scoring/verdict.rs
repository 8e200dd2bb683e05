use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::extract_json_object;
use crate::models::ScreeningStatus;

/// At most this many reasons are kept from a model answer.
pub const MAX_SIGNALS: usize = 5;

/// Constrained result of scoring one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: ScreeningStatus,
    pub signals: Vec<String>,
    pub explanation: String,
}

impl Verdict {
    /// `needs_review` with a diagnostic signal; used whenever the model's
    /// answer cannot be trusted.
    pub fn needs_review(signal: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            status: ScreeningStatus::NeedsReview,
            signals: vec![signal.into()],
            explanation: explanation.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    #[serde(alias = "status", alias = "screening_status")]
    screening_status: Option<String>,
    #[serde(default)]
    signals: Vec<String>,
    #[serde(alias = "explanation", alias = "ai_explanation")]
    ai_explanation: Option<String>,
}

/// Parses the model's free text into a `Verdict`. Never fails: anything
/// unusable degrades to `needs_review` with the reason recorded as a signal.
pub fn parse_verdict(text: &str) -> Verdict {
    let raw: RawVerdict = match serde_json::from_str(extract_json_object(text)) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Scoring response is not valid JSON: {e}");
            return Verdict::needs_review(
                "AI response could not be parsed",
                "The AI evaluation was unreadable. Please review manually.",
            );
        }
    };

    let mut signals: Vec<String> = raw
        .signals
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SIGNALS)
        .collect();

    let status = match raw.screening_status.as_deref().map(ScreeningStatus::parse_loose) {
        Some(Some(status)) => status,
        Some(None) | None => {
            let shown = raw.screening_status.unwrap_or_else(|| "<missing>".to_string());
            warn!("Scoring response has unrecognized status '{shown}'");
            signals.truncate(MAX_SIGNALS - 1);
            signals.push(format!("Unrecognized screening status '{shown}'"));
            ScreeningStatus::NeedsReview
        }
    };

    Verdict {
        status,
        signals,
        explanation: raw
            .ai_explanation
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "Analysis completed.".to_string()),
    }
}
