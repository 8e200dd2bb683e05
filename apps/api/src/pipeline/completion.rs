use tracing::{error, info, warn};

use crate::models::CandidateStatus;
use crate::notify::Delivery;

use super::Pipeline;

impl Pipeline {
    /// Notifies the job owner once no candidate of the job is pending or
    /// processing. Returns whether the job was found complete.
    ///
    /// Two workers finishing the last candidates at the same time may both
    /// notify. Failures here are logged and never fail the caller.
    pub async fn check_and_notify(&self, job_id: i64) -> bool {
        let in_flight = match self
            .store
            .count_by_status(job_id, &CandidateStatus::IN_FLIGHT)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                error!(job_id, "Completion check failed: {e}");
                return false;
            }
        };
        if in_flight > 0 {
            return false;
        }

        info!(job_id, "All candidates processed");

        let job = match self.store.find_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job_id, "Job vanished before completion notice");
                return true;
            }
            Err(e) => {
                error!(job_id, "Failed to load job for completion notice: {e}");
                return true;
            }
        };
        let owner = match self.store.find_user(job.owner_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                warn!(job_id, owner_id = job.owner_id, "Job owner not found, no notice sent");
                return true;
            }
            Err(e) => {
                error!(job_id, "Failed to load job owner: {e}");
                return true;
            }
        };

        match self
            .notifier
            .notify_job_complete(&owner.email, job.id, &job.title)
            .await
        {
            Ok(Delivery::Sent { .. }) => {}
            Ok(Delivery::Skipped(reason)) => info!(job_id, "Completion notice skipped: {reason}"),
            Err(e) => error!(job_id, "Failed to send completion notice: {e}"),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::store::CandidateStore;
    use crate::testing::{FakeFetch, Harness};

    #[tokio::test]
    async fn test_notifies_only_after_last_candidate() {
        let h = Harness::new();
        let (job, candidates) = h.seed_job(2).await;

        h.pipeline.process_message(candidates[0].id).await.unwrap();
        assert!(h.notifier.sent().is_empty());

        h.pipeline.process_message(candidates[1].id).await.unwrap();
        assert_eq!(h.notifier.sent(), vec![("owner@example.com".to_string(), job.id)]);
    }

    #[tokio::test]
    async fn test_failed_repository_still_counts_towards_completion() {
        let h = Harness::new();
        let (job, candidates) = h.seed_job(1).await;
        h.fetcher.set(&candidates[0].github_url, FakeFetch::NotFound);

        h.pipeline.process_message(candidates[0].id).await.unwrap();

        assert_eq!(h.notifier.sent().len(), 1);
        assert_eq!(h.notifier.sent()[0].1, job.id);
    }

    #[tokio::test]
    async fn test_fires_again_after_new_candidates_finish() {
        let h = Harness::new();
        let (job, candidates) = h.seed_job(1).await;
        h.pipeline.process_message(candidates[0].id).await.unwrap();

        let added = h.add_candidates(job.id, 1).await;
        assert!(!h.pipeline.check_and_notify(job.id).await);
        h.pipeline.process_message(added[0].id).await.unwrap();

        assert_eq!(h.notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_processing() {
        let h = Harness::new();
        let (_, candidates) = h.seed_job(1).await;
        h.notifier.fail_all();

        let outcome = h.pipeline.process_message(candidates[0].id).await;

        assert!(outcome.is_ok());
        let stored = h.store.find_candidate(candidates[0].id).await.unwrap().unwrap();
        assert!(stored.status.is_terminal());
    }
}
