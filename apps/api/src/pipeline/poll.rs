//! Claim-based poll loop: each step atomically claims one pending candidate
//! of a job and processes it. Any number of loops may run for the same job;
//! the claim guarantees every candidate is handled by exactly one of them.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::CandidateStatus;

use super::{Pipeline, PipelineError};

/// Consecutive failed steps after which a drain loop gives up.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollStep {
    /// Candidates this step claimed and carried to a result (0 or 1).
    pub processed: u32,
    /// Candidates of the job still waiting in `pending`.
    pub remaining: i64,
}

impl Pipeline {
    pub async fn poll_step(&self, job_id: i64) -> Result<PollStep, PipelineError> {
        let job = self
            .store
            .find_job(job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))?;

        let mut processed = 0;
        if let Some(candidate) = self.store.claim_pending_candidate(job_id).await? {
            self.process_claimed(&candidate, &job).await?;
            processed = 1;
        }

        let remaining = self
            .store
            .count_by_status(job_id, &[CandidateStatus::Pending])
            .await?;
        Ok(PollStep {
            processed,
            remaining,
        })
    }

    /// Repeats `poll_step` until the job has nothing pending. Returns the
    /// number of candidates this loop processed.
    pub async fn drain_job(self: Arc<Self>, job_id: i64) -> u32 {
        let mut total = 0;
        let mut failures = 0;

        loop {
            match self.poll_step(job_id).await {
                Ok(step) => {
                    failures = 0;
                    total += step.processed;
                    if step.remaining == 0 {
                        break;
                    }
                    if step.processed == 0 {
                        tokio::time::sleep(self.settings.idle_backoff).await;
                    }
                }
                Err(PipelineError::JobNotFound(_)) => {
                    warn!(job_id, "Job not found, stopping drain");
                    break;
                }
                Err(e) => {
                    failures += 1;
                    warn!(job_id, failures, "Poll step failed: {e}");
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        warn!(job_id, "Giving up drain; remaining candidates stay pending");
                        break;
                    }
                    tokio::time::sleep(self.settings.idle_backoff * failures).await;
                }
            }
        }

        info!(job_id, processed = total, "Drain loop finished");
        total
    }
}
