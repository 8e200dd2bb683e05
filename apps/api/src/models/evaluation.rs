use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable output of one scoring attempt. Append-only.
///
/// `signals` is an ordered list here; the Postgres store keeps it as JSON text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub candidate_id: i64,
    pub signals: Vec<String>,
    pub ai_explanation: String,
    pub created_at: DateTime<Utc>,
}
