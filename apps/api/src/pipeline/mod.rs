//! Candidate processing pipeline.
//!
//! `pending -> processing -> {looks_fine | needs_review | low_effort | github_failed}`
//!
//! Two drivers share the same claim protocol and per-candidate steps:
//! the queue worker (`worker`) and the claim-based poll loop (`poll`).
//! A candidate is only ever worked on by whoever won its claim.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::github::SignalFetcher;
use crate::models::CandidateStatus;
use crate::notify::Notifier;
use crate::queue::TaskQueue;
use crate::scoring::Scorer;
use crate::store::{CandidateStore, StoreError};

pub mod completion;
pub mod dispatch;
pub mod handlers;
pub mod poll;
pub mod sweep;
pub mod worker;

pub use dispatch::DispatchReport;
pub use poll::PollStep;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Upstream failure worth retrying. The claim has already been released.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("job {0} not found")]
    JobNotFound(i64),
}

/// Result of handling one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "status")]
pub enum Outcome {
    /// The candidate reached this terminal status.
    Processed(CandidateStatus),
    /// Someone else holds or already finished the candidate.
    Skipped,
    CandidateNotFound,
    JobNotFound,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Pause before touching upstream APIs for each candidate.
    pub processing_delay: Duration,
    /// Pause of a drain loop when a claim lost a race or an upstream failed.
    pub idle_backoff: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_millis(4000),
            idle_backoff: Duration::from_millis(500),
        }
    }
}

pub struct Pipeline {
    pub(crate) store: Arc<dyn CandidateStore>,
    pub(crate) fetcher: Arc<dyn SignalFetcher>,
    pub(crate) scorer: Arc<dyn Scorer>,
    pub(crate) notifier: Arc<dyn Notifier>,
    /// `None` runs the in-process drain loop instead of the queue.
    pub(crate) queue: Option<Arc<dyn TaskQueue>>,
    pub(crate) settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        fetcher: Arc<dyn SignalFetcher>,
        scorer: Arc<dyn Scorer>,
        notifier: Arc<dyn Notifier>,
        queue: Option<Arc<dyn TaskQueue>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            scorer,
            notifier,
            queue,
            settings,
        }
    }

    pub fn uses_queue(&self) -> bool {
        self.queue.is_some()
    }
}
