use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::errors::AppError;
use crate::queue::signature::SIGNATURE_HEADER;
use crate::queue::ProcessCandidateMessage;
use crate::state::AppState;

use super::{Outcome, PollStep};

/// POST /api/v1/process-candidate
///
/// Queue delivery target. 2xx acknowledges the message (including for
/// candidates that no longer exist); 5xx asks the queue to redeliver.
pub async fn handle_process_candidate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if let Some(verifier) = &state.verifier {
        let token = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(e) = verifier.verify(token, &body) {
            warn!("Rejected queue delivery: {e}");
            return Err(AppError::Unauthorized);
        }
    }

    let message: ProcessCandidateMessage = serde_json::from_slice(&body)
        .map_err(|_| AppError::Validation("Missing candidateId".to_string()))?;
    if message.candidate_id <= 0 {
        return Err(AppError::Validation("Missing candidateId".to_string()));
    }

    let reply = match state.pipeline.process_message(message.candidate_id).await? {
        Outcome::Processed(status) => json!({ "success": true, "result": status }),
        Outcome::Skipped => json!({ "success": true, "result": "skipped" }),
        Outcome::CandidateNotFound => json!({ "error": "Candidate not found" }),
        Outcome::JobNotFound => json!({ "error": "Job not found" }),
    };
    Ok((StatusCode::OK, Json(reply)))
}

/// POST /api/v1/jobs/:id/triage/step
pub async fn handle_triage_step(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<PollStep>, AppError> {
    let step = state.pipeline.poll_step(job_id).await?;
    Ok(Json(step))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::models::CandidateStatus;
    use crate::queue::SignatureVerifier;
    use crate::routes::build_router;
    use crate::store::CandidateStore;
    use crate::testing::{FakeFetch, Harness};

    fn state(h: &Harness, verifier: Option<SignatureVerifier>) -> AppState {
        AppState {
            store: h.store.clone(),
            pipeline: Arc::clone(&h.pipeline),
            verifier,
        }
    }

    fn delivery(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/process-candidate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let h = Harness::new();
        let app = build_router(state(&h, None));

        let response = app.oneshot(delivery("{\"id\": 3}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_candidate_is_acknowledged_with_error_body() {
        let h = Harness::new();
        let app = build_router(state(&h, None));

        let response = app.oneshot(delivery(r#"{"candidateId": 777}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["error"], "Candidate not found");
    }

    #[tokio::test]
    async fn test_delivery_processes_candidate() {
        let h = Harness::new();
        let (_, candidates) = h.seed_job(1).await;
        let app = build_router(state(&h, None));

        let body = format!(r#"{{"candidateId": {}}}"#, candidates[0].id);
        let response = app.oneshot(delivery(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["result"], "looks_fine");
    }

    #[tokio::test]
    async fn test_transient_failure_asks_for_redelivery() {
        let h = Harness::new();
        let (_, candidates) = h.seed_job(1).await;
        h.fetcher.set(&candidates[0].github_url, FakeFetch::Transient);
        let app = build_router(state(&h, None));

        let body = format!(r#"{{"candidateId": {}}}"#, candidates[0].id);
        let response = app.oneshot(delivery(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let stored = h.store.find_candidate(candidates[0].id).await.unwrap().unwrap();
        assert_eq!(stored.status, CandidateStatus::Pending);
    }

    #[tokio::test]
    async fn test_unsigned_delivery_is_rejected_when_keys_configured() {
        let h = Harness::new();
        let (_, candidates) = h.seed_job(1).await;
        let verifier = SignatureVerifier::new("current".to_string(), None, None);
        let app = build_router(state(&h, Some(verifier)));

        let body = format!(r#"{{"candidateId": {}}}"#, candidates[0].id);
        let response = app.oneshot(delivery(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_triage_step_for_unknown_job_is_not_found() {
        let h = Harness::new();
        let app = build_router(state(&h, None));

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/jobs/41/triage/step")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
