pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::jobs::handlers as jobs;
use crate::pipeline::handlers as pipeline;
use crate::state::AppState;
use crate::users::handlers as users;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/users", post(users::handle_create_user))
        .route("/api/v1/users/:id", get(users::handle_get_user))
        .route(
            "/api/v1/jobs",
            post(jobs::handle_create_job).get(jobs::handle_list_jobs),
        )
        .route(
            "/api/v1/jobs/:id/candidates",
            post(jobs::handle_add_candidates),
        )
        .route("/api/v1/jobs/:id/triage", get(jobs::handle_triage_board))
        .route(
            "/api/v1/jobs/:id/triage/step",
            post(pipeline::handle_triage_step),
        )
        .route("/api/v1/candidates", get(jobs::handle_list_candidates))
        .route(
            "/api/v1/candidates/:id/disposition",
            patch(jobs::handle_set_disposition),
        )
        // Queue delivery target
        .route(
            "/api/v1/process-candidate",
            post(pipeline::handle_process_candidate),
        )
        .with_state(state)
}
