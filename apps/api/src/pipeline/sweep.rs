use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{Pipeline, PipelineError};

impl Pipeline {
    /// Returns candidates stuck in `processing` (crashed worker, lost
    /// delivery) to `pending` and dispatches them again.
    pub async fn sweep_stale_claims(
        self: &Arc<Self>,
        stale_after: Duration,
    ) -> Result<usize, PipelineError> {
        let reclaimed = self.store.reclaim_stale(stale_after).await?;
        if reclaimed.is_empty() {
            return Ok(0);
        }

        info!(count = reclaimed.len(), "Reclaimed stale claims");
        let pairs: Vec<(i64, i64)> = reclaimed.iter().map(|c| (c.id, c.job_id)).collect();
        self.dispatch(&pairs).await;
        Ok(reclaimed.len())
    }
}

/// Runs `sweep_stale_claims` every `interval` for the life of the process.
pub fn spawn_sweeper(
    pipeline: Arc<Pipeline>,
    stale_after: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = pipeline.sweep_stale_claims(stale_after).await {
                error!("Stale claim sweep failed: {e}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use crate::models::CandidateStatus;
    use crate::testing::{FlakyQueue, Harness};

    #[tokio::test]
    async fn test_stale_claim_is_requeued() {
        let queue = Arc::new(FlakyQueue::failing_for(&[]));
        let h = Harness::with_queue(queue.clone());
        let (_, candidates) = h.seed_job(2).await;
        let stuck = candidates[0].id;
        h.store.force_status(
            stuck,
            CandidateStatus::Processing,
            Some(Utc::now() - chrono::Duration::hours(1)),
        );
        h.store.force_status(candidates[1].id, CandidateStatus::Processing, Some(Utc::now()));

        let count = h
            .pipeline
            .sweep_stale_claims(Duration::from_secs(900))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(queue.published(), vec![stuck]);
    }

    #[tokio::test]
    async fn test_nothing_stale_is_a_no_op() {
        let queue = Arc::new(FlakyQueue::failing_for(&[]));
        let h = Harness::with_queue(queue.clone());
        h.seed_job(2).await;

        let count = h
            .pipeline
            .sweep_stale_claims(Duration::from_secs(900))
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert!(queue.published().is_empty());
    }
}
