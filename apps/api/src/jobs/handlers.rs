use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::jobs::{build_triage_board, AddCandidatesRequest, CreateJobRequest, TriageBoard};
use crate::models::{Candidate, CandidateListing, Disposition, Job};
use crate::pipeline::DispatchReport;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: i64,
}

#[derive(Serialize)]
pub struct AddCandidatesResponse {
    pub candidates: Vec<Candidate>,
    pub dispatch: DispatchReport,
}

#[derive(Deserialize)]
pub struct DispositionRequest {
    pub disposition: Disposition,
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    req.validate().map_err(AppError::Validation)?;
    if state.store.find_user(req.user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", req.user_id)));
    }

    let job = state
        .store
        .create_job(req.user_id, req.title.trim(), req.description.trim())
        .await?;
    info!(job_id = job.id, owner_id = job.owner_id, "Created job");
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs?user_id=
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Job>>, AppError> {
    Ok(Json(state.store.list_jobs(params.user_id).await?))
}

/// GET /api/v1/candidates?user_id=
///
/// Every candidate across the user's jobs, each with its job title.
pub async fn handle_list_candidates(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<CandidateListing>>, AppError> {
    Ok(Json(
        state.store.list_candidates_for_owner(params.user_id).await?,
    ))
}

/// POST /api/v1/jobs/:id/candidates
///
/// Inserts the batch as `pending`, then hands it to the queue (or the
/// in-process drain). Enqueue failures are reported but keep the insert.
pub async fn handle_add_candidates(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Json(req): Json<AddCandidatesRequest>,
) -> Result<(StatusCode, Json<AddCandidatesResponse>), AppError> {
    let new = req.into_validated().map_err(AppError::Validation)?;
    if state.store.find_job(job_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Job {job_id} not found")));
    }

    let candidates = state.store.insert_candidates(job_id, &new).await?;
    info!(job_id, count = candidates.len(), "Added candidates");

    let pairs: Vec<(i64, i64)> = candidates.iter().map(|c| (c.id, c.job_id)).collect();
    let dispatch = state.pipeline.dispatch(&pairs).await;

    Ok((
        StatusCode::CREATED,
        Json(AddCandidatesResponse {
            candidates,
            dispatch,
        }),
    ))
}

/// GET /api/v1/jobs/:id/triage
pub async fn handle_triage_board(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<TriageBoard>, AppError> {
    if state.store.find_job(job_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Job {job_id} not found")));
    }
    let candidates = state.store.list_candidates(job_id).await?;
    let evaluations = state.store.list_evaluations(job_id).await?;
    Ok(Json(build_triage_board(job_id, candidates, evaluations)))
}

/// PATCH /api/v1/candidates/:id/disposition
pub async fn handle_set_disposition(
    State(state): State<AppState>,
    Path(candidate_id): Path<i64>,
    Json(req): Json<DispositionRequest>,
) -> Result<StatusCode, AppError> {
    if !state
        .store
        .set_disposition(candidate_id, req.disposition)
        .await?
    {
        return Err(AppError::NotFound(format!("Candidate {candidate_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
