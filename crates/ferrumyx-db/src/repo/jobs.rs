//! `embedding_jobs` — the durable background queue. Workers claim a job
//! via one `UPDATE ... RETURNING` compare-and-set; Postgres resolves the
//! race at the row level, so no optimistic-locking retry loop is needed.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::EmbeddingJob;

/// What a queued job will do once claimed: embed a PDF's chunks, or
/// embed a unified-scope's chunks. Exactly one target is ever set on the
/// resulting row, mirrored by `job_type`.
pub enum JobTarget {
    Pdf { pdf_id: Uuid },
    Unified { source_type: String, source_id: String },
}

impl JobTarget {
    fn job_type(&self) -> &'static str {
        match self {
            JobTarget::Pdf { .. } => "pdf_embed",
            JobTarget::Unified { .. } => "unified_embed",
        }
    }
}

pub struct NewEmbeddingJob {
    pub target: JobTarget,
    pub model_name: String,
    pub batch_size: Option<i32>,
    pub force: bool,
    pub priority: i32,
}

pub async fn enqueue(pool: &PgPool, job: NewEmbeddingJob) -> Result<EmbeddingJob, sqlx::Error> {
    let job_type = job.target.job_type();
    let (pdf_id, source_type, source_id) = match job.target {
        JobTarget::Pdf { pdf_id } => (Some(pdf_id), None, None),
        JobTarget::Unified { source_type, source_id } => (None, Some(source_type), Some(source_id)),
    };
    sqlx::query_as::<_, EmbeddingJob>(
        "INSERT INTO embedding_jobs
            (id, pdf_id, source_type, source_id, job_type, model_name, batch_size, force,
             status, priority, retry_count, worker_id, progress, error_log, created_at, started_at, completed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, 0, NULL, 0.0, NULL, now(), NULL, NULL)
         RETURNING id, pdf_id, source_type, source_id, job_type, model_name, batch_size, force,
                   status, priority, retry_count, worker_id, progress, error_log, created_at, started_at, completed_at",
    )
    .bind(Uuid::new_v4())
    .bind(pdf_id)
    .bind(source_type)
    .bind(source_id)
    .bind(job_type)
    .bind(job.model_name)
    .bind(job.batch_size)
    .bind(job.force)
    .bind(job.priority)
    .fetch_one(pool)
    .await
}

/// Claim the highest-priority pending job for `worker_id`. Returns `None`
/// if another worker already claimed it, or the queue is empty.
pub async fn claim_next(
    pool: &PgPool,
    worker_id: &str,
) -> Result<Option<EmbeddingJob>, sqlx::Error> {
    sqlx::query_as::<_, EmbeddingJob>(
        "UPDATE embedding_jobs
         SET status = 'running', worker_id = $1, started_at = now()
         WHERE id = (
             SELECT id FROM embedding_jobs
             WHERE status = 'pending'
             ORDER BY priority DESC, created_at ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING id, pdf_id, source_type, source_id, job_type, model_name, batch_size, force,
                   status, priority, retry_count, worker_id, progress, error_log, created_at, started_at, completed_at",
    )
    .bind(worker_id)
    .fetch_optional(pool)
    .await
}

/// Re-check ownership before updating progress, per the concurrency model.
pub async fn update_progress(
    pool: &PgPool,
    job_id: Uuid,
    worker_id: &str,
    progress: f32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE embedding_jobs SET progress = $1 WHERE id = $2 AND worker_id = $3 AND status = 'running'",
    )
    .bind(progress)
    .bind(job_id)
    .bind(worker_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn complete(pool: &PgPool, job_id: Uuid, worker_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE embedding_jobs SET status = 'succeeded', progress = 1.0, completed_at = now()
         WHERE id = $1 AND worker_id = $2",
    )
    .bind(job_id)
    .bind(worker_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Increment `retry_count` and back off on `Transient` failures; mark
/// `FAILED` once `retry_count` reaches `max_retries`.
pub async fn fail(
    pool: &PgPool,
    job_id: Uuid,
    worker_id: &str,
    error: &str,
    max_retries: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE embedding_jobs
         SET retry_count = retry_count + 1,
             error_log = $1,
             status = CASE WHEN retry_count + 1 >= $2 THEN 'failed' ELSE 'pending' END,
             worker_id = CASE WHEN retry_count + 1 >= $2 THEN worker_id ELSE NULL END,
             completed_at = CASE WHEN retry_count + 1 >= $2 THEN now() ELSE NULL END
         WHERE id = $3 AND worker_id = $4",
    )
    .bind(error)
    .bind(max_retries)
    .bind(job_id)
    .bind(worker_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<EmbeddingJob>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as::<_, EmbeddingJob>(
                "SELECT id, pdf_id, source_type, source_id, job_type, model_name, batch_size, force,
                        status, priority, retry_count, worker_id, progress, error_log, created_at, started_at, completed_at
                 FROM embedding_jobs WHERE status = $1 ORDER BY created_at DESC LIMIT $2",
            )
            .bind(status)
            .bind(limit)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, EmbeddingJob>(
                "SELECT id, pdf_id, source_type, source_id, job_type, model_name, batch_size, force,
                        status, priority, retry_count, worker_id, progress, error_log, created_at, started_at, completed_at
                 FROM embedding_jobs ORDER BY created_at DESC LIMIT $1",
            )
            .bind(limit)
            .fetch_all(pool)
            .await
        }
    }
}

pub async fn summary(pool: &PgPool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as("SELECT status, count(*) FROM embedding_jobs GROUP BY status")
        .fetch_all(pool)
        .await
}
