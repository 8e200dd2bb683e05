use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::debug;

use super::{CandidateStore, StoreError};
use crate::models::{
    Candidate, CandidateListing, CandidateStatus, Disposition, Evaluation, Job, NewCandidate, User,
};

/// PostgreSQL-backed store. Claims are single `UPDATE … RETURNING` statements.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Row mapping: statuses and signals are plain TEXT in the database
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: i64,
    job_id: i64,
    name: String,
    email: String,
    github_url: String,
    resume_text: Option<String>,
    status: String,
    final_disposition: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
    claim_epoch: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CandidateListingRow {
    #[sqlx(flatten)]
    candidate: CandidateRow,
    job_title: String,
}

impl TryFrom<CandidateRow> for Candidate {
    type Error = StoreError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(StoreError::Corrupt)?;
        let final_disposition = row
            .final_disposition
            .as_deref()
            .map(str::parse::<Disposition>)
            .transpose()
            .map_err(StoreError::Corrupt)?;

        Ok(Candidate {
            id: row.id,
            job_id: row.job_id,
            name: row.name,
            email: row.email,
            github_url: row.github_url,
            resume_text: row.resume_text,
            status,
            final_disposition,
            claimed_at: row.claimed_at,
            claim_epoch: row.claim_epoch,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<CandidateListingRow> for CandidateListing {
    type Error = StoreError;

    fn try_from(row: CandidateListingRow) -> Result<Self, Self::Error> {
        Ok(CandidateListing {
            candidate: Candidate::try_from(row.candidate)?,
            job_title: row.job_title,
        })
    }
}

#[derive(Debug, FromRow)]
struct EvaluationRow {
    id: i64,
    candidate_id: i64,
    signals: String,
    ai_explanation: String,
    created_at: DateTime<Utc>,
}

impl From<EvaluationRow> for Evaluation {
    fn from(row: EvaluationRow) -> Self {
        // Rows written outside this service may hold a bare string.
        let signals = serde_json::from_str::<Vec<String>>(&row.signals)
            .unwrap_or_else(|_| vec![row.signals.clone()]);
        Evaluation {
            id: row.id,
            candidate_id: row.candidate_id,
            signals,
            ai_explanation: row.ai_explanation,
            created_at: row.created_at,
        }
    }
}

fn into_candidates(rows: Vec<CandidateRow>) -> Result<Vec<Candidate>, StoreError> {
    rows.into_iter().map(Candidate::try_from).collect()
}

fn status_strings(statuses: &[CandidateStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// CandidateStore
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CandidateStore for PgStore {
    async fn create_user(&self, email: &str, name: Option<&str>) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>("INSERT INTO users (email, name) VALUES ($1, $2) RETURNING *")
            .bind(email)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_unique_violation() => {
                    StoreError::Conflict(format!("user with email '{email}'"))
                }
                _ => StoreError::Database(e),
            })
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_job(
        &self,
        owner_id: i64,
        title: &str,
        description: &str,
    ) -> Result<Job, StoreError> {
        Ok(sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (owner_id, title, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(owner_id)
        .bind(title)
        .bind(description)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_job(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        Ok(sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_jobs(&self, owner_id: i64) -> Result<Vec<Job>, StoreError> {
        Ok(sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_candidates(
        &self,
        job_id: i64,
        candidates: &[NewCandidate],
    ) -> Result<Vec<Candidate>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let row = sqlx::query_as::<_, CandidateRow>(
                r#"
                INSERT INTO candidates (job_id, name, email, github_url, resume_text, status)
                VALUES ($1, $2, $3, $4, $5, 'pending')
                RETURNING *
                "#,
            )
            .bind(job_id)
            .bind(&candidate.name)
            .bind(&candidate.email)
            .bind(&candidate.github_url)
            .bind(&candidate.resume_text)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(Candidate::try_from(row)?);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn find_candidate(&self, candidate_id: i64) -> Result<Option<Candidate>, StoreError> {
        sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE id = $1")
            .bind(candidate_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Candidate::try_from)
            .transpose()
    }

    async fn list_candidates(&self, job_id: i64) -> Result<Vec<Candidate>, StoreError> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            "SELECT * FROM candidates WHERE job_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        into_candidates(rows)
    }

    async fn list_candidates_for_owner(
        &self,
        owner_id: i64,
    ) -> Result<Vec<CandidateListing>, StoreError> {
        let rows = sqlx::query_as::<_, CandidateListingRow>(
            r#"
            SELECT c.*, j.title AS job_title
            FROM   candidates c
            JOIN   jobs j ON j.id = c.job_id
            WHERE  j.owner_id = $1
            ORDER  BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CandidateListing::try_from).collect()
    }

    async fn list_evaluations(&self, job_id: i64) -> Result<Vec<Evaluation>, StoreError> {
        let rows = sqlx::query_as::<_, EvaluationRow>(
            r#"
            SELECT DISTINCT ON (e.candidate_id) e.*
            FROM evaluations e
            JOIN candidates c ON c.id = e.candidate_id
            WHERE c.job_id = $1
            ORDER BY e.candidate_id, e.created_at DESC, e.id DESC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Evaluation::from).collect())
    }

    async fn set_disposition(
        &self,
        candidate_id: i64,
        disposition: Disposition,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE candidates SET final_disposition = $1 WHERE id = $2")
            .bind(disposition.as_str())
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn claim_candidate(&self, candidate_id: i64) -> Result<Option<Candidate>, StoreError> {
        sqlx::query_as::<_, CandidateRow>(
            r#"
            UPDATE candidates
            SET    status = 'processing',
                   claimed_at = NOW(),
                   claim_epoch = claim_epoch + 1
            WHERE  id = $1
              AND  status = 'pending'
            RETURNING *
            "#,
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Candidate::try_from)
        .transpose()
    }

    async fn claim_pending_candidate(&self, job_id: i64) -> Result<Option<Candidate>, StoreError> {
        // SKIP LOCKED keeps concurrent pollers from queueing on the same row;
        // the outer status check is what makes the claim exclusive.
        sqlx::query_as::<_, CandidateRow>(
            r#"
            UPDATE candidates
            SET    status = 'processing',
                   claimed_at = NOW(),
                   claim_epoch = claim_epoch + 1
            WHERE  id = (
                SELECT id
                FROM   candidates
                WHERE  job_id = $1
                  AND  status = 'pending'
                ORDER  BY id ASC
                LIMIT  1
                FOR UPDATE SKIP LOCKED
            )
              AND  status = 'pending'
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Candidate::try_from)
        .transpose()
    }

    async fn release_claim(&self, candidate_id: i64, claim_epoch: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE candidates SET status = 'pending', claimed_at = NULL \
             WHERE id = $1 AND status = 'processing' AND claim_epoch = $2",
        )
        .bind(candidate_id)
        .bind(claim_epoch)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_candidate(
        &self,
        candidate_id: i64,
        claim_epoch: i64,
        status: CandidateStatus,
        signals: &[String],
        explanation: &str,
    ) -> Result<bool, StoreError> {
        let signals_json = serde_json::to_string(signals)
            .map_err(|e| StoreError::Corrupt(format!("failed to encode signals: {e}")))?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE candidates SET status = $1 \
             WHERE id = $2 AND status = 'processing' AND claim_epoch = $3",
        )
        .bind(status.as_str())
        .bind(candidate_id)
        .bind(claim_epoch)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(candidate_id, claim_epoch, "completion skipped: claim no longer held");
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO evaluations (candidate_id, signals, ai_explanation) VALUES ($1, $2, $3)",
        )
        .bind(candidate_id)
        .bind(&signals_json)
        .bind(explanation)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn count_by_status(
        &self,
        job_id: i64,
        statuses: &[CandidateStatus],
    ) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM candidates WHERE job_id = $1 AND status = ANY($2)",
        )
        .bind(job_id)
        .bind(status_strings(statuses))
        .fetch_one(&self.pool)
        .await?)
    }

    async fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<Candidate>, StoreError> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            UPDATE candidates
            SET    status = 'pending',
                   claimed_at = NULL
            WHERE  status = 'processing'
              AND  claimed_at < NOW() - make_interval(secs => $1)
            RETURNING *
            "#,
        )
        .bind(older_than.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;
        into_candidates(rows)
    }
}
