//! In-memory `CandidateStore` used by the pipeline and router tests.
//! A single mutex makes every conditional update atomic, mirroring the
//! row-level compare-and-swap of the Postgres store.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{CandidateStore, StoreError};
use crate::models::{
    Candidate, CandidateListing, CandidateStatus, Disposition, Evaluation, Job, NewCandidate, User,
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<i64, User>,
    jobs: BTreeMap<i64, Job>,
    candidates: BTreeMap<i64, Candidate>,
    evaluations: Vec<Evaluation>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All evaluations written for a candidate, oldest first.
    pub fn evaluations_for(&self, candidate_id: i64) -> Vec<Evaluation> {
        let inner = self.inner.lock().unwrap();
        inner
            .evaluations
            .iter()
            .filter(|e| e.candidate_id == candidate_id)
            .cloned()
            .collect()
    }

    /// Forces a candidate into a given state, bypassing the claim protocol.
    pub fn force_status(
        &self,
        candidate_id: i64,
        status: CandidateStatus,
        claimed_at: Option<DateTime<Utc>>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(candidate) = inner.candidates.get_mut(&candidate_id) {
            candidate.status = status;
            candidate.claimed_at = claimed_at;
        }
    }
}

fn take_claim(candidate: &mut Candidate) -> Candidate {
    candidate.status = CandidateStatus::Processing;
    candidate.claimed_at = Some(Utc::now());
    candidate.claim_epoch += 1;
    candidate.clone()
}

fn holds_claim(candidate: &Candidate, claim_epoch: i64) -> bool {
    candidate.status == CandidateStatus::Processing && candidate.claim_epoch == claim_epoch
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn create_user(&self, email: &str, name: Option<&str>) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict(format!("user with email '{email}'")));
        }
        let user = User {
            id: inner.next_id(),
            email: email.to_string(),
            name: name.map(String::from),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn create_job(
        &self,
        owner_id: i64,
        title: &str,
        description: &str,
    ) -> Result<Job, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let job = Job {
            id: inner.next_id(),
            owner_id,
            title: title.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        inner.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        Ok(self.inner.lock().unwrap().jobs.get(&job_id).cloned())
    }

    async fn list_jobs(&self, owner_id: i64) -> Result<Vec<Job>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .jobs
            .values()
            .rev()
            .filter(|j| j.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn insert_candidates(
        &self,
        job_id: i64,
        candidates: &[NewCandidate],
    ) -> Result<Vec<Candidate>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut inserted = Vec::with_capacity(candidates.len());
        for new in candidates {
            let candidate = Candidate {
                id: inner.next_id(),
                job_id,
                name: new.name.clone(),
                email: new.email.clone(),
                github_url: new.github_url.clone(),
                resume_text: new.resume_text.clone(),
                status: CandidateStatus::Pending,
                final_disposition: None,
                claimed_at: None,
                claim_epoch: 0,
                created_at: Utc::now(),
            };
            inner.candidates.insert(candidate.id, candidate.clone());
            inserted.push(candidate);
        }
        Ok(inserted)
    }

    async fn find_candidate(&self, candidate_id: i64) -> Result<Option<Candidate>, StoreError> {
        Ok(self.inner.lock().unwrap().candidates.get(&candidate_id).cloned())
    }

    async fn list_candidates(&self, job_id: i64) -> Result<Vec<Candidate>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .candidates
            .values()
            .rev()
            .filter(|c| c.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn list_candidates_for_owner(
        &self,
        owner_id: i64,
    ) -> Result<Vec<CandidateListing>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .candidates
            .values()
            .rev()
            .filter_map(|c| {
                let job = inner.jobs.get(&c.job_id)?;
                (job.owner_id == owner_id).then(|| CandidateListing {
                    candidate: c.clone(),
                    job_title: job.title.clone(),
                })
            })
            .collect())
    }

    async fn list_evaluations(&self, job_id: i64) -> Result<Vec<Evaluation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut latest: BTreeMap<i64, Evaluation> = BTreeMap::new();
        for evaluation in &inner.evaluations {
            let belongs = inner
                .candidates
                .get(&evaluation.candidate_id)
                .is_some_and(|c| c.job_id == job_id);
            if belongs {
                latest.insert(evaluation.candidate_id, evaluation.clone());
            }
        }
        Ok(latest.into_values().collect())
    }

    async fn set_disposition(
        &self,
        candidate_id: i64,
        disposition: Disposition,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.candidates.get_mut(&candidate_id) {
            Some(candidate) => {
                candidate.final_disposition = Some(disposition);
                true
            }
            None => false,
        })
    }

    async fn claim_candidate(&self, candidate_id: i64) -> Result<Option<Candidate>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.candidates.get_mut(&candidate_id) {
            Some(candidate) if candidate.status == CandidateStatus::Pending => {
                Some(take_claim(candidate))
            }
            _ => None,
        })
    }

    async fn claim_pending_candidate(&self, job_id: i64) -> Result<Option<Candidate>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let claimed = inner
            .candidates
            .values_mut()
            .find(|c| c.job_id == job_id && c.status == CandidateStatus::Pending)
            .map(take_claim);
        Ok(claimed)
    }

    async fn release_claim(&self, candidate_id: i64, claim_epoch: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.candidates.get_mut(&candidate_id) {
            Some(candidate) if holds_claim(candidate, claim_epoch) => {
                candidate.status = CandidateStatus::Pending;
                candidate.claimed_at = None;
                true
            }
            _ => false,
        })
    }

    async fn complete_candidate(
        &self,
        candidate_id: i64,
        claim_epoch: i64,
        status: CandidateStatus,
        signals: &[String],
        explanation: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.candidates.get_mut(&candidate_id) {
            Some(candidate) if holds_claim(candidate, claim_epoch) => {
                candidate.status = status;
            }
            _ => return Ok(false),
        }
        let evaluation = Evaluation {
            id: inner.next_id(),
            candidate_id,
            signals: signals.to_vec(),
            ai_explanation: explanation.to_string(),
            created_at: Utc::now(),
        };
        inner.evaluations.push(evaluation);
        Ok(true)
    }

    async fn count_by_status(
        &self,
        job_id: i64,
        statuses: &[CandidateStatus],
    ) -> Result<i64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .candidates
            .values()
            .filter(|c| c.job_id == job_id && statuses.contains(&c.status))
            .count() as i64)
    }

    async fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<Candidate>, StoreError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::zero());
        let mut inner = self.inner.lock().unwrap();
        let mut reclaimed = Vec::new();
        for candidate in inner.candidates.values_mut() {
            let stale = candidate.status == CandidateStatus::Processing
                && candidate.claimed_at.is_some_and(|at| at < cutoff);
            if stale {
                candidate.status = CandidateStatus::Pending;
                candidate.claimed_at = None;
                reclaimed.push(candidate.clone());
            }
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryStore, Job, Candidate) {
        let store = MemoryStore::new();
        let owner = store.create_user("owner@example.com", None).await.unwrap();
        let job = store.create_job(owner.id, "Backend Engineer", "Rust").await.unwrap();
        let candidate = store
            .insert_candidates(
                job.id,
                &[NewCandidate {
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                    github_url: "https://github.com/ada/engine".to_string(),
                    resume_text: None,
                }],
            )
            .await
            .unwrap()
            .remove(0);
        (store, job, candidate)
    }

    #[tokio::test]
    async fn test_stale_holder_cannot_release_a_newer_claim() {
        let (store, _, candidate) = seeded().await;
        let id = candidate.id;

        let a = store.claim_candidate(id).await.unwrap().unwrap();
        store.force_status(
            id,
            CandidateStatus::Processing,
            Some(Utc::now() - chrono::Duration::hours(1)),
        );
        assert_eq!(store.reclaim_stale(Duration::from_secs(60)).await.unwrap().len(), 1);
        let b = store.claim_candidate(id).await.unwrap().unwrap();

        assert!(!store.release_claim(id, a.claim_epoch).await.unwrap());
        assert!(store.claim_candidate(id).await.unwrap().is_none());
        assert!(!store
            .complete_candidate(id, a.claim_epoch, CandidateStatus::LowEffort, &[], "late")
            .await
            .unwrap());
        assert!(store.evaluations_for(id).is_empty());

        assert!(store
            .complete_candidate(id, b.claim_epoch, CandidateStatus::LooksFine, &[], "ok")
            .await
            .unwrap());
        let stored = store.find_candidate(id).await.unwrap().unwrap();
        assert_eq!(stored.status, CandidateStatus::LooksFine);
    }

    #[tokio::test]
    async fn test_owner_listing_spans_jobs_newest_first() {
        let (store, job, first) = seeded().await;
        let other_job = store.create_job(job.owner_id, "Data Engineer", "SQL").await.unwrap();
        let stranger = store.create_user("someone@example.com", None).await.unwrap();
        let foreign_job = store.create_job(stranger.id, "Designer", "Figma").await.unwrap();
        let new = |name: &str| NewCandidate {
            name: name.to_string(),
            email: format!("{name}@example.com"),
            github_url: format!("https://github.com/{name}/repo"),
            resume_text: None,
        };
        let second = store.insert_candidates(other_job.id, &[new("grace")]).await.unwrap();
        store.insert_candidates(foreign_job.id, &[new("eve")]).await.unwrap();

        let listing = store.list_candidates_for_owner(job.owner_id).await.unwrap();

        let ids: Vec<i64> = listing.iter().map(|l| l.candidate.id).collect();
        assert_eq!(ids, vec![second[0].id, first.id]);
        assert_eq!(listing[0].job_title, "Data Engineer");
        assert_eq!(listing[1].job_title, "Backend Engineer");
    }
}
