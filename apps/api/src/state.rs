use std::sync::Arc;

use crate::pipeline::Pipeline;
use crate::queue::SignatureVerifier;
use crate::store::CandidateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CandidateStore>,
    pub pipeline: Arc<Pipeline>,
    /// Present when signing keys are configured; deliveries are then verified.
    pub verifier: Option<SignatureVerifier>,
}
