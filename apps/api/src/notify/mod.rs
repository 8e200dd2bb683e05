//! Completion e-mail through the Resend HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const RESEND_URL: &str = "https://api.resend.com/emails";
pub const DEFAULT_FROM: &str = "Triage <notifications@resend.dev>";
pub const COMPLETION_SUBJECT: &str = "All candidates have been processed";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// What happened to a notification attempt that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent { id: Option<String> },
    Skipped(&'static str),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_job_complete(
        &self,
        recipient: &str,
        job_id: i64,
        job_title: &str,
    ) -> Result<Delivery, NotifyError>;
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: String,
}

#[derive(Deserialize)]
struct EmailResponse {
    id: Option<String>,
}

pub struct ResendNotifier {
    client: Client,
    api_key: Option<String>,
    from: String,
    /// Base URL used for the dashboard link in the message body.
    app_url: Option<String>,
}

impl ResendNotifier {
    pub fn new(api_key: Option<String>, from: Option<String>, app_url: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key: api_key.filter(|k| !k.is_empty()),
            from: from.unwrap_or_else(|| DEFAULT_FROM.to_string()),
            app_url,
        }
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn notify_job_complete(
        &self,
        recipient: &str,
        job_id: i64,
        job_title: &str,
    ) -> Result<Delivery, NotifyError> {
        let Some(api_key) = &self.api_key else {
            warn!("RESEND_API_KEY not configured. Skipping completion email");
            return Ok(Delivery::Skipped("no api key"));
        };
        if recipient.trim().is_empty() {
            warn!(job_id, "Job owner has no email address. Skipping completion email");
            return Ok(Delivery::Skipped("no recipient"));
        }

        let request = EmailRequest {
            from: &self.from,
            to: recipient,
            subject: COMPLETION_SUBJECT,
            html: completion_html(job_id, job_title, self.app_url.as_deref()),
        };

        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmailResponse = response.json().await?;
        info!(job_id, "Sent completion email to {recipient}");
        Ok(Delivery::Sent { id: body.id })
    }
}

fn completion_html(job_id: i64, job_title: &str, app_url: Option<&str>) -> String {
    let link = match app_url {
        Some(base) => format!(
            r#"<p><a href="{}/api/v1/jobs/{job_id}/triage">View the triage results</a></p>"#,
            base.trim_end_matches('/')
        ),
        None => String::new(),
    };
    format!(
        "<h2>Triage complete</h2>\
         <p>Every candidate for <strong>{}</strong> has been screened.</p>{link}",
        escape_html(job_title)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
