//! Test doubles for the pipeline's collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::github::{CommitSignal, FetchError, OwnerSignals, RepoSignals, SignalFetcher};
use crate::models::{Candidate, Job, NewCandidate, ScreeningStatus};
use crate::notify::{Delivery, Notifier, NotifyError};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::queue::{QueueError, TaskQueue};
use crate::scoring::{ScoreError, Scorer, Verdict};
use crate::store::memory::MemoryStore;
use crate::store::CandidateStore;

#[derive(Clone)]
pub enum FakeFetch {
    Signals(RepoSignals),
    NotFound,
    Transient,
}

/// Returns healthy signals for any URL unless told otherwise.
#[derive(Default)]
pub struct FakeFetcher {
    overrides: Mutex<HashMap<String, FakeFetch>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn set(&self, url: &str, reply: FakeFetch) {
        self.overrides.lock().unwrap().insert(url.to_string(), reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn healthy_signals() -> RepoSignals {
    RepoSignals {
        owner: "dev".to_string(),
        repo: "project".to_string(),
        readme: "Detailed README. ".repeat(40),
        commits: (0..12)
            .map(|i| CommitSignal {
                message: format!("Add feature {i}"),
                author_name: "Dev".to_string(),
                author_login: Some("dev".to_string()),
                author_id: Some(1),
                date: None,
            })
            .collect(),
        owner_profile: OwnerSignals {
            login: "dev".to_string(),
            id: Some(1),
            account_type: "User".to_string(),
            recent_events: 80,
            ..OwnerSignals::default()
        },
        ..RepoSignals::default()
    }
}

#[async_trait]
impl SignalFetcher for FakeFetcher {
    async fn fetch(&self, repo_url: &str) -> Result<RepoSignals, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.overrides.lock().unwrap().get(repo_url).cloned();
        match reply {
            None => Ok(healthy_signals()),
            Some(FakeFetch::Signals(signals)) => Ok(signals),
            Some(FakeFetch::NotFound) => Err(FetchError::NotFound(format!("{repo_url} returned HTTP 404"))),
            Some(FakeFetch::Transient) => Err(FetchError::Transient("HTTP 503".to_string())),
        }
    }
}

/// Always answers `looks_fine`, optionally failing the first few calls.
#[derive(Default)]
pub struct FakeScorer {
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeScorer {
    pub fn fail_next(&self, times: usize) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scorer for FakeScorer {
    async fn score(
        &self,
        _candidate_name: &str,
        _job_description: &str,
        _signals: &RepoSignals,
    ) -> Result<Verdict, ScoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ScoreError::Transient("HTTP 529 overloaded".to_string()));
        }
        Ok(Verdict {
            status: ScreeningStatus::LooksFine,
            signals: vec!["Steady commit history".to_string()],
            explanation: "Solid submission.".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, i64)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, i64)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_job_complete(
        &self,
        recipient: &str,
        job_id: i64,
        _job_title: &str,
    ) -> Result<Delivery, NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Api {
                status: 500,
                message: "mail provider down".to_string(),
            });
        }
        self.sent.lock().unwrap().push((recipient.to_string(), job_id));
        Ok(Delivery::Sent { id: None })
    }
}

/// Records published candidate ids; refuses the ones marked as failing.
#[derive(Default)]
pub struct FlakyQueue {
    failing: Mutex<HashSet<i64>>,
    published: Mutex<Vec<i64>>,
}

impl FlakyQueue {
    pub fn failing_for(ids: &[i64]) -> Self {
        Self {
            failing: Mutex::new(ids.iter().copied().collect()),
            published: Mutex::default(),
        }
    }

    pub fn fail_for(&self, candidate_id: i64) {
        self.failing.lock().unwrap().insert(candidate_id);
    }

    pub fn published(&self) -> Vec<i64> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for FlakyQueue {
    async fn enqueue(&self, candidate_id: i64) -> Result<String, QueueError> {
        if self.failing.lock().unwrap().contains(&candidate_id) {
            return Err(QueueError::Api {
                status: 500,
                message: "queue unavailable".to_string(),
            });
        }
        self.published.lock().unwrap().push(candidate_id);
        Ok(format!("msg_{candidate_id}"))
    }
}

/// A pipeline wired to in-memory collaborators, with no delays.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub scorer: Arc<FakeScorer>,
    pub notifier: Arc<RecordingNotifier>,
    pub pipeline: Arc<Pipeline>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_queue(queue: Arc<dyn TaskQueue>) -> Self {
        Self::build(Some(queue))
    }

    fn build(queue: Option<Arc<dyn TaskQueue>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(FakeFetcher::default());
        let scorer = Arc::new(FakeScorer::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            fetcher.clone(),
            scorer.clone(),
            notifier.clone(),
            queue,
            PipelineSettings {
                processing_delay: Duration::ZERO,
                idle_backoff: Duration::from_millis(1),
            },
        ));
        Self {
            store,
            fetcher,
            scorer,
            notifier,
            pipeline,
        }
    }

    /// Creates an owner, a job and `count` pending candidates.
    pub async fn seed_job(&self, count: usize) -> (Job, Vec<Candidate>) {
        let owner = self
            .store
            .create_user("owner@example.com", Some("Owner"))
            .await
            .unwrap();
        let job = self
            .store
            .create_job(owner.id, "Backend Engineer", "Build reliable Rust services.")
            .await
            .unwrap();
        let candidates = self.add_candidates(job.id, count).await;
        (job, candidates)
    }

    pub async fn add_candidates(&self, job_id: i64, count: usize) -> Vec<Candidate> {
        let existing = self.store.list_candidates(job_id).await.unwrap().len();
        let new: Vec<NewCandidate> = (existing..existing + count)
            .map(|i| NewCandidate {
                name: format!("Candidate {i}"),
                email: format!("candidate{i}@example.com"),
                github_url: format!("https://github.com/dev{i}/project"),
                resume_text: None,
            })
            .collect();
        self.store.insert_candidates(job_id, &new).await.unwrap()
    }
}
