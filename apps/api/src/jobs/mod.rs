//! Jobs, candidate upload and the per-job triage board.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Candidate, CandidateStatus, Evaluation, NewCandidate};

pub mod handlers;

pub const MIN_TITLE_CHARS: usize = 3;
pub const MIN_DESCRIPTION_CHARS: usize = 10;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub user_id: i64,
    pub title: String,
    pub description: String,
}

impl CreateJobRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().chars().count() < MIN_TITLE_CHARS {
            return Err(format!("title must be at least {MIN_TITLE_CHARS} characters"));
        }
        if self.description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
            return Err(format!(
                "description must be at least {MIN_DESCRIPTION_CHARS} characters"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCandidatesRequest {
    pub candidates: Vec<NewCandidate>,
}

impl AddCandidatesRequest {
    /// Trims every field and rejects the batch if any row lacks a required one.
    pub fn into_validated(self) -> Result<Vec<NewCandidate>, String> {
        if self.candidates.is_empty() {
            return Err("at least one candidate is required".to_string());
        }
        self.candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let c = NewCandidate {
                    name: c.name.trim().to_string(),
                    email: c.email.trim().to_string(),
                    github_url: c.github_url.trim().to_string(),
                    resume_text: c.resume_text.filter(|t| !t.trim().is_empty()),
                };
                if c.name.is_empty() || c.email.is_empty() || c.github_url.is_empty() {
                    return Err(format!(
                        "candidate #{}: name, email and github_url are required",
                        i + 1
                    ));
                }
                Ok(c)
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct TriageEntry {
    pub candidate: Candidate,
    pub evaluation: Option<Evaluation>,
}

#[derive(Debug, Default, Serialize)]
pub struct TriageCounts {
    pub total: usize,
    pub looks_fine: usize,
    pub needs_review: usize,
    pub low_effort: usize,
    pub github_failed: usize,
    pub in_flight: usize,
}

/// Candidates of one job grouped the way the dashboard shows them.
#[derive(Debug, Default, Serialize)]
pub struct TriageBoard {
    pub job_id: i64,
    pub looks_fine: Vec<TriageEntry>,
    pub needs_review: Vec<TriageEntry>,
    pub low_effort: Vec<TriageEntry>,
    pub github_failed: Vec<TriageEntry>,
    /// `pending` and `processing`.
    pub in_flight: Vec<TriageEntry>,
    pub counts: TriageCounts,
    pub complete: bool,
}

pub fn build_triage_board(
    job_id: i64,
    candidates: Vec<Candidate>,
    evaluations: Vec<Evaluation>,
) -> TriageBoard {
    let mut latest: HashMap<i64, Evaluation> = HashMap::new();
    for evaluation in evaluations {
        match latest.get(&evaluation.candidate_id) {
            Some(seen) if seen.created_at >= evaluation.created_at => {}
            _ => {
                latest.insert(evaluation.candidate_id, evaluation);
            }
        }
    }

    let mut board = TriageBoard {
        job_id,
        ..TriageBoard::default()
    };
    for candidate in candidates {
        let entry = TriageEntry {
            evaluation: latest.remove(&candidate.id),
            candidate,
        };
        let group = match entry.candidate.status {
            CandidateStatus::LooksFine => &mut board.looks_fine,
            CandidateStatus::NeedsReview => &mut board.needs_review,
            CandidateStatus::LowEffort => &mut board.low_effort,
            CandidateStatus::GithubFailed => &mut board.github_failed,
            CandidateStatus::Pending | CandidateStatus::Processing => &mut board.in_flight,
        };
        group.push(entry);
    }

    board.counts = TriageCounts {
        looks_fine: board.looks_fine.len(),
        needs_review: board.needs_review.len(),
        low_effort: board.low_effort.len(),
        github_failed: board.github_failed.len(),
        in_flight: board.in_flight.len(),
        total: board.looks_fine.len()
            + board.needs_review.len()
            + board.low_effort.len()
            + board.github_failed.len()
            + board.in_flight.len(),
    };
    board.complete = board.in_flight.is_empty();
    board
}
