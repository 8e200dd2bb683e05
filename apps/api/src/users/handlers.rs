use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::errors::AppError;
use crate::models::User;
use crate::state::AppState;
use crate::users::CreateUserRequest;

/// POST /api/v1/users
pub async fn handle_create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    req.validate().map_err(AppError::Validation)?;
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let user = state.store.create_user(req.email.trim(), name).await?;
    info!(user_id = user.id, "Created user");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, AppError> {
    state
        .store
        .find_user(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
}
