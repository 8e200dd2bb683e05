//! Candidate store: persistence for users, jobs, candidates and evaluations.
//!
//! Every status transition goes through a single conditional write (compare
//! and swap on `status`), so concurrent workers and pollers can never hold the
//! same candidate at once and a terminal status is never overwritten.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Candidate, CandidateListing, CandidateStatus, Disposition, Evaluation, Job, NewCandidate, User,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("already exists: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn create_user(&self, email: &str, name: Option<&str>) -> Result<User, StoreError>;

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, StoreError>;

    async fn create_job(&self, owner_id: i64, title: &str, description: &str)
        -> Result<Job, StoreError>;

    async fn find_job(&self, job_id: i64) -> Result<Option<Job>, StoreError>;

    /// Jobs owned by a user, newest first.
    async fn list_jobs(&self, owner_id: i64) -> Result<Vec<Job>, StoreError>;

    /// Inserts all candidates in `pending`, in one transaction.
    async fn insert_candidates(
        &self,
        job_id: i64,
        candidates: &[NewCandidate],
    ) -> Result<Vec<Candidate>, StoreError>;

    async fn find_candidate(&self, candidate_id: i64) -> Result<Option<Candidate>, StoreError>;

    async fn list_candidates(&self, job_id: i64) -> Result<Vec<Candidate>, StoreError>;

    /// Candidates across every job the user owns, newest first.
    async fn list_candidates_for_owner(
        &self,
        owner_id: i64,
    ) -> Result<Vec<CandidateListing>, StoreError>;

    /// Latest evaluation per candidate of the job.
    async fn list_evaluations(&self, job_id: i64) -> Result<Vec<Evaluation>, StoreError>;

    async fn set_disposition(
        &self,
        candidate_id: i64,
        disposition: Disposition,
    ) -> Result<bool, StoreError>;

    /// `pending -> processing` for one specific candidate, bumping its
    /// `claim_epoch`. Returns `None` if the candidate is no longer pending.
    async fn claim_candidate(&self, candidate_id: i64) -> Result<Option<Candidate>, StoreError>;

    /// `pending -> processing` for any one candidate of the job.
    /// Returns `None` if nothing is pending or a racing claimant won.
    async fn claim_pending_candidate(&self, job_id: i64) -> Result<Option<Candidate>, StoreError>;

    /// `processing -> pending`, handing the candidate back for redelivery.
    /// Only the holder of `claim_epoch` can release.
    async fn release_claim(&self, candidate_id: i64, claim_epoch: i64)
        -> Result<bool, StoreError>;

    /// Writes the terminal status and its evaluation atomically, but only if
    /// the candidate is still `processing` under `claim_epoch`. Returns `false`
    /// when the claim was lost in the meantime (nothing is written).
    async fn complete_candidate(
        &self,
        candidate_id: i64,
        claim_epoch: i64,
        status: CandidateStatus,
        signals: &[String],
        explanation: &str,
    ) -> Result<bool, StoreError>;

    async fn count_by_status(
        &self,
        job_id: i64,
        statuses: &[CandidateStatus],
    ) -> Result<i64, StoreError>;

    /// Resets candidates stuck in `processing` for longer than `older_than`
    /// back to `pending` and returns them.
    async fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<Candidate>, StoreError>;
}
