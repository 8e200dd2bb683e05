use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Pipeline status
// ────────────────────────────────────────────────────────────────────────────

/// Pipeline state of a candidate.
///
/// The snake_case strings are persisted verbatim and the dashboard groups on
/// them, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Processing,
    LooksFine,
    NeedsReview,
    LowEffort,
    GithubFailed,
}

impl CandidateStatus {
    /// Statuses that still count as "not finished" for completion detection.
    pub const IN_FLIGHT: [CandidateStatus; 2] = [CandidateStatus::Pending, CandidateStatus::Processing];

    pub const TERMINAL: [CandidateStatus; 4] = [
        CandidateStatus::LooksFine,
        CandidateStatus::NeedsReview,
        CandidateStatus::LowEffort,
        CandidateStatus::GithubFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Processing => "processing",
            CandidateStatus::LooksFine => "looks_fine",
            CandidateStatus::NeedsReview => "needs_review",
            CandidateStatus::LowEffort => "low_effort",
            CandidateStatus::GithubFailed => "github_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !Self::IN_FLIGHT.contains(self)
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CandidateStatus::Pending),
            "processing" => Ok(CandidateStatus::Processing),
            "looks_fine" => Ok(CandidateStatus::LooksFine),
            "needs_review" => Ok(CandidateStatus::NeedsReview),
            "low_effort" => Ok(CandidateStatus::LowEffort),
            "github_failed" => Ok(CandidateStatus::GithubFailed),
            other => Err(format!("unknown candidate status '{other}'")),
        }
    }
}

/// The three outcomes the scoring engine is allowed to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningStatus {
    LooksFine,
    NeedsReview,
    LowEffort,
}

impl ScreeningStatus {
    /// Case-insensitive parse of a model-produced status string.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "looks_fine" => Some(ScreeningStatus::LooksFine),
            "needs_review" => Some(ScreeningStatus::NeedsReview),
            "low_effort" => Some(ScreeningStatus::LowEffort),
            _ => None,
        }
    }
}

impl From<ScreeningStatus> for CandidateStatus {
    fn from(status: ScreeningStatus) -> Self {
        match status {
            ScreeningStatus::LooksFine => CandidateStatus::LooksFine,
            ScreeningStatus::NeedsReview => CandidateStatus::NeedsReview,
            ScreeningStatus::LowEffort => CandidateStatus::LowEffort,
        }
    }
}

/// Human-assigned final decision. Independent of the pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Forward,
    Reject,
    Hold,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Forward => "forward",
            Disposition::Reject => "reject",
            Disposition::Hold => "hold",
        }
    }
}

impl FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Disposition::Forward),
            "reject" => Ok(Disposition::Reject),
            "hold" => Ok(Disposition::Hold),
            other => Err(format!("unknown disposition '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub job_id: i64,
    pub name: String,
    pub email: String,
    pub github_url: String,
    pub resume_text: Option<String>,
    pub status: CandidateStatus,
    pub final_disposition: Option<Disposition>,
    /// Set when the candidate enters `processing`; used to reclaim stuck rows.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Bumped by every claim. Identifies the current holder.
    pub claim_epoch: i64,
    pub created_at: DateTime<Utc>,
}

/// A candidate together with the title of the job it applied to.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateListing {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub job_title: String,
}

/// Upload payload for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCandidate {
    pub name: String,
    pub email: String,
    pub github_url: String,
    #[serde(default)]
    pub resume_text: Option<String>,
}
