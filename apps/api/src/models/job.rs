use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A job posting. Candidates are triaged against `description`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
