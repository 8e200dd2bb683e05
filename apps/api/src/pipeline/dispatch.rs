use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::queue::enqueue_batch;

use super::Pipeline;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    /// `"queue"` or `"inline"`.
    pub mode: &'static str,
    pub enqueued: usize,
    /// Candidates the queue refused. They stay `pending` until the poll
    /// loop or a later dispatch picks them up.
    pub failed: Vec<i64>,
}

impl Pipeline {
    /// Hands freshly pending candidates to whichever driver is configured:
    /// one queue message per candidate, or a background drain per job.
    pub async fn dispatch(self: &Arc<Self>, candidates: &[(i64, i64)]) -> DispatchReport {
        if let Some(queue) = &self.queue {
            let ids: Vec<i64> = candidates.iter().map(|(id, _)| *id).collect();
            let report = enqueue_batch(queue.as_ref(), &ids).await;
            return DispatchReport {
                mode: "queue",
                enqueued: report.enqueued,
                failed: report.failed,
            };
        }

        let jobs: BTreeSet<i64> = candidates.iter().map(|(_, job_id)| *job_id).collect();
        for job_id in jobs {
            info!(job_id, "Starting in-process drain");
            tokio::spawn(Arc::clone(self).drain_job(job_id));
        }
        DispatchReport {
            mode: "inline",
            ..DispatchReport::default()
        }
    }
}
