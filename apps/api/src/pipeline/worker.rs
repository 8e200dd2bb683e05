//! Per-candidate state machine, shared by the queue worker and the poll loop.

use tracing::{error, info, warn};

use crate::github::FetchError;
use crate::models::{Candidate, CandidateStatus, Job};
use crate::scoring::ScoreError;

use super::{Outcome, Pipeline, PipelineError};

const GITHUB_FAILED_SIGNAL: &str = "Invalid or private GitHub URL";
const GITHUB_FAILED_EXPLANATION: &str = "Could not access repository metadata.";

impl Pipeline {
    /// Handles one queue delivery for `candidate_id`.
    ///
    /// Redeliveries are harmless: a candidate that is not `pending` any more
    /// is skipped without side effects.
    pub async fn process_message(&self, candidate_id: i64) -> Result<Outcome, PipelineError> {
        info!(candidate_id, "Starting processing");

        let Some(candidate) = self.store.find_candidate(candidate_id).await? else {
            error!(candidate_id, "Candidate not found");
            return Ok(Outcome::CandidateNotFound);
        };
        let Some(job) = self.store.find_job(candidate.job_id).await? else {
            error!(candidate_id, job_id = candidate.job_id, "Job not found for candidate");
            return Ok(Outcome::JobNotFound);
        };

        let Some(claimed) = self.store.claim_candidate(candidate_id).await? else {
            info!(
                candidate_id,
                status = %candidate.status,
                "Candidate already claimed or finished, skipping"
            );
            return Ok(Outcome::Skipped);
        };

        self.process_claimed(&claimed, &job).await
    }

    /// Runs fetch, score and persist for a candidate this caller has claimed.
    /// Any error hands the claim back so a retry can pick the candidate up.
    pub(crate) async fn process_claimed(
        &self,
        candidate: &Candidate,
        job: &Job,
    ) -> Result<Outcome, PipelineError> {
        let result = self.run_steps(candidate, job).await;
        if let Err(e) = &result {
            warn!(candidate_id = candidate.id, "Processing failed, releasing claim: {e}");
            match self.store.release_claim(candidate.id, candidate.claim_epoch).await {
                Ok(true) => {}
                Ok(false) => warn!(candidate_id = candidate.id, "Claim was no longer held"),
                Err(release_err) => {
                    error!(candidate_id = candidate.id, "Failed to release claim: {release_err}")
                }
            }
        }
        result
    }

    async fn run_steps(&self, candidate: &Candidate, job: &Job) -> Result<Outcome, PipelineError> {
        if !self.settings.processing_delay.is_zero() {
            tokio::time::sleep(self.settings.processing_delay).await;
        }

        let signals = match self.fetcher.fetch(&candidate.github_url).await {
            Ok(signals) => signals,
            Err(FetchError::NotFound(reason)) => {
                info!(candidate_id = candidate.id, "Repository not accessible: {reason}");
                return self
                    .finish(
                        candidate,
                        CandidateStatus::GithubFailed,
                        &[GITHUB_FAILED_SIGNAL.to_string(), reason],
                        GITHUB_FAILED_EXPLANATION,
                    )
                    .await;
            }
            Err(FetchError::Transient(reason)) => return Err(PipelineError::Transient(reason)),
        };

        let verdict = self
            .scorer
            .score(&candidate.name, &job.description, &signals)
            .await
            .map_err(|ScoreError::Transient(reason)| PipelineError::Transient(reason))?;

        info!(
            candidate_id = candidate.id,
            "Analysis result: {:?}", verdict.status
        );
        self.finish(
            candidate,
            verdict.status.into(),
            &verdict.signals,
            &verdict.explanation,
        )
        .await
    }

    async fn finish(
        &self,
        candidate: &Candidate,
        status: CandidateStatus,
        signals: &[String],
        explanation: &str,
    ) -> Result<Outcome, PipelineError> {
        let written = self
            .store
            .complete_candidate(candidate.id, candidate.claim_epoch, status, signals, explanation)
            .await?;
        if !written {
            warn!(candidate_id = candidate.id, "Claim lost before completion, result discarded");
            return Ok(Outcome::Skipped);
        }

        self.check_and_notify(candidate.job_id).await;
        Ok(Outcome::Processed(status))
    }
}
