mod config;
mod db;
mod errors;
mod github;
mod jobs;
mod llm_client;
mod models;
mod notify;
mod pipeline;
mod queue;
mod routes;
mod scoring;
mod state;
mod store;
mod users;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::github::GithubClient;
use crate::llm_client::LlmClient;
use crate::notify::ResendNotifier;
use crate::pipeline::{sweep::spawn_sweeper, Pipeline, PipelineSettings};
use crate::queue::{QstashQueue, SignatureVerifier, TaskQueue};
use crate::routes::build_router;
use crate::scoring::LlmScorer;
use crate::state::AppState;
use crate::store::{CandidateStore, PgStore};

/// Per-request bound on GitHub and Anthropic calls.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Triage API v{}", env!("CARGO_PKG_VERSION"));

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    let store: Arc<dyn CandidateStore> = Arc::new(PgStore::new(pool));

    if config.github_token.is_none() {
        warn!("GITHUB_TOKEN not set; unauthenticated GitHub rate limits apply");
    }
    let fetcher = Arc::new(GithubClient::new(
        &config.github_api_url,
        config.github_token.clone(),
        UPSTREAM_TIMEOUT,
    ));

    let llm = config
        .anthropic_api_key
        .clone()
        .map(|key| LlmClient::new(key, UPSTREAM_TIMEOUT));
    match &llm {
        Some(_) => info!("LLM client initialized (model: {})", llm_client::MODEL),
        None => warn!("ANTHROPIC_API_KEY not set; candidates will be sent to manual review"),
    }
    let scorer = Arc::new(LlmScorer::new(llm));

    let notifier = Arc::new(ResendNotifier::new(
        config.resend_api_key.clone(),
        config.notify_from.clone(),
        config.app_url.clone(),
    ));

    let queue: Option<Arc<dyn TaskQueue>> = match &config.qstash {
        Some(settings) => {
            let qstash = QstashQueue::new(settings.clone());
            if let Err(e) = qstash.ensure_queue().await {
                warn!("Could not configure queue '{}': {e}", settings.queue_name);
            }
            Some(Arc::new(qstash))
        }
        None => {
            info!("QSTASH_TOKEN not set; candidates are processed in-process");
            None
        }
    };

    let verifier = match &config.qstash_current_signing_key {
        Some(current) => Some(SignatureVerifier::new(
            current.clone(),
            config.qstash_next_signing_key.clone(),
            config.qstash.as_ref().map(|q| q.worker_url()),
        )),
        None => {
            if queue.is_some() {
                warn!("QSTASH_CURRENT_SIGNING_KEY not set; queue deliveries are NOT verified");
            }
            None
        }
    };

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        fetcher,
        scorer,
        notifier,
        queue,
        PipelineSettings {
            processing_delay: config.processing_delay,
            ..PipelineSettings::default()
        },
    ));

    spawn_sweeper(
        Arc::clone(&pipeline),
        config.stale_claim_after,
        config.sweep_interval,
    );

    let state = AppState {
        store,
        pipeline,
        verifier,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
