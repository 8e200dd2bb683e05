//! Task queue: durable, at-least-once delivery of one message per candidate
//! to the worker endpoint, through an Upstash QStash queue.
//!
//! The queue's parallelism is the only limiter on concurrent calls to GitHub
//! and the LLM provider; nothing in-process duplicates it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

pub mod signature;

pub use signature::SignatureVerifier;

/// Path of the worker endpoint, relative to the public app URL.
pub const WORKER_PATH: &str = "/api/v1/process-candidate";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("queue API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publishes one processing message for a candidate. Returns the message id.
    async fn enqueue(&self, candidate_id: i64) -> Result<String, QueueError>;
}

/// Message body delivered to the worker endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCandidateMessage {
    pub candidate_id: i64,
}

#[derive(Debug, Clone)]
pub struct QstashSettings {
    pub base_url: String,
    pub token: String,
    pub queue_name: String,
    /// Public URL of this service; the worker endpoint is appended to it.
    pub app_url: String,
    pub parallelism: u32,
    pub retries: u32,
}

impl QstashSettings {
    pub fn worker_url(&self) -> String {
        format!("{}{}", self.app_url.trim_end_matches('/'), WORKER_PATH)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueResponse {
    message_id: String,
}

#[derive(Clone)]
pub struct QstashQueue {
    client: Client,
    settings: QstashSettings,
}

impl QstashQueue {
    pub fn new(settings: QstashSettings) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| Client::new()),
            settings,
        }
    }

    /// Creates or updates the named queue with the configured parallelism.
    pub async fn ensure_queue(&self) -> Result<(), QueueError> {
        let url = format!("{}/v2/queues/", self.base_url());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.token)
            .json(&serde_json::json!({
                "queueName": self.settings.queue_name,
                "parallelism": self.settings.parallelism,
            }))
            .send()
            .await?;

        check_status(response).await?;
        info!(
            "Queue '{}' configured with parallelism {}",
            self.settings.queue_name, self.settings.parallelism
        );
        Ok(())
    }

    fn base_url(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }
}

#[async_trait]
impl TaskQueue for QstashQueue {
    async fn enqueue(&self, candidate_id: i64) -> Result<String, QueueError> {
        let url = format!(
            "{}/v2/enqueue/{}/{}",
            self.base_url(),
            self.settings.queue_name,
            self.settings.worker_url()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.token)
            .header("Upstash-Retries", self.settings.retries.to_string())
            .json(&ProcessCandidateMessage { candidate_id })
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: EnqueueResponse = response.json().await?;
        Ok(body.message_id)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, QueueError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(QueueError::Api {
        status: status.as_u16(),
        message,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Batch dispatch
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Serialize)]
pub struct EnqueueReport {
    pub enqueued: usize,
    /// Candidates whose message could not be published. They stay `pending`.
    pub failed: Vec<i64>,
}

/// Publishes one message per candidate. A failure for one candidate is logged
/// and recorded but never aborts the rest of the batch.
pub async fn enqueue_batch(queue: &dyn TaskQueue, candidate_ids: &[i64]) -> EnqueueReport {
    let mut report = EnqueueReport::default();
    for &candidate_id in candidate_ids {
        match queue.enqueue(candidate_id).await {
            Ok(message_id) => {
                info!(candidate_id, message_id = %message_id, "Enqueued candidate for processing");
                report.enqueued += 1;
            }
            Err(e) => {
                error!(candidate_id, "Failed to enqueue candidate: {e}");
                report.failed.push(candidate_id);
            }
        }
    }
    report
}
