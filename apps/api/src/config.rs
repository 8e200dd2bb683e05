use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::github::DEFAULT_GITHUB_API_URL;
use crate::queue::QstashSettings;

const DEFAULT_QSTASH_URL: &str = "https://qstash.upstash.io";
const DEFAULT_QUEUE_NAME: &str = "triage-processing-queue";

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Public base URL of this service (queue callbacks, e-mail links).
    pub app_url: Option<String>,
    /// GitHub REST base; override for GitHub Enterprise.
    pub github_api_url: String,
    pub github_token: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// `None` disables the queue; candidates are then drained in-process.
    pub qstash: Option<QstashSettings>,
    pub qstash_current_signing_key: Option<String>,
    pub qstash_next_signing_key: Option<String>,
    pub resend_api_key: Option<String>,
    pub notify_from: Option<String>,
    pub processing_delay: Duration,
    pub stale_claim_after: Duration,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let app_url = optional_env("APP_URL");
        let qstash = match optional_env("QSTASH_TOKEN") {
            Some(token) => {
                let Some(app_url) = app_url.clone() else {
                    bail!("APP_URL must be set when QSTASH_TOKEN is set");
                };
                let parallelism = parse_env("QSTASH_PARALLELISM", 1u32)?;
                if !(1..=100).contains(&parallelism) {
                    bail!("QSTASH_PARALLELISM must be between 1 and 100, got {parallelism}");
                }
                Some(QstashSettings {
                    base_url: optional_env("QSTASH_URL")
                        .unwrap_or_else(|| DEFAULT_QSTASH_URL.to_string()),
                    token,
                    queue_name: optional_env("QSTASH_QUEUE_NAME")
                        .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
                    app_url,
                    parallelism,
                    retries: parse_env("QSTASH_RETRIES", 3u32)?,
                })
            }
            None => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            app_url,
            github_api_url: optional_env("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            github_token: optional_env("GITHUB_TOKEN"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            qstash,
            qstash_current_signing_key: optional_env("QSTASH_CURRENT_SIGNING_KEY"),
            qstash_next_signing_key: optional_env("QSTASH_NEXT_SIGNING_KEY"),
            resend_api_key: optional_env("RESEND_API_KEY"),
            notify_from: optional_env("NOTIFY_FROM"),
            processing_delay: Duration::from_millis(parse_env("PROCESSING_DELAY_MS", 4000u64)?),
            stale_claim_after: Duration::from_secs(parse_env("STALE_CLAIM_SECS", 900u64)?),
            sweep_interval: Duration::from_secs(parse_env("SWEEP_INTERVAL_SECS", 60u64)?),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and empty are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
