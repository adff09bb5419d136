//! Background embedding-job worker: polls `embedding_jobs`, claims the
//! highest-priority pending row, dispatches it to `embed_pdf` or
//! `embed_unified_chunks`, and records the outcome. Driven entirely by
//! the durable queue table — no in-memory job state survives a restart.

use std::sync::Arc;
use std::time::Duration;

use ferrumyx_common::error::RagError;
use ferrumyx_db::models::EmbeddingJob;
use ferrumyx_db::repo::{ingestion_status, jobs};
use ferrumyx_embed::{EmbeddingClient, ModelRegistry};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::embedding::{embed_pdf, embed_unified_chunks};

pub struct JobWorkerConfig {
    pub worker_id: String,
    pub poll_interval: Duration,
    pub max_retries: i32,
}

/// Runs until the process exits. Intended to be spawned with
/// `tokio::spawn` once at startup; a single worker is sufficient since
/// `claim_next`'s `FOR UPDATE SKIP LOCKED` already lets multiple
/// processes share the same queue safely.
pub async fn run(
    pool: PgPool,
    client: Arc<dyn EmbeddingClient>,
    registry: Arc<ModelRegistry>,
    cfg: JobWorkerConfig,
) {
    loop {
        match jobs::claim_next(&pool, &cfg.worker_id).await {
            Ok(Some(job)) => {
                let job_id = job.id;
                if let Err(e) = run_job(&pool, client.as_ref(), &registry, &job).await {
                    warn!(job_id = %job_id, error = %e, "embedding job failed");
                    if let Err(fail_err) =
                        jobs::fail(&pool, job_id, &cfg.worker_id, &e.to_string(), cfg.max_retries).await
                    {
                        error!(job_id = %job_id, error = %fail_err, "failed to record job failure");
                    }
                } else if let Err(e) = jobs::complete(&pool, job_id, &cfg.worker_id).await {
                    error!(job_id = %job_id, error = %e, "failed to record job completion");
                } else {
                    info!(job_id = %job_id, "embedding job complete");
                }
            }
            Ok(None) => tokio::time::sleep(cfg.poll_interval).await,
            Err(e) => {
                error!(error = %e, "failed to poll embedding job queue");
                tokio::time::sleep(cfg.poll_interval).await;
            }
        }
    }
}

async fn run_job(
    pool: &PgPool,
    client: &dyn EmbeddingClient,
    registry: &ModelRegistry,
    job: &EmbeddingJob,
) -> Result<(), RagError> {
    let batch_size = job.batch_size.map(|n| n.max(0) as usize);

    match job.job_type.as_str() {
        "pdf_embed" => {
            let pdf_id = job
                .pdf_id
                .ok_or_else(|| RagError::Fatal(format!("pdf_embed job {} has no pdf_id", job.id)))?;
            embed_pdf(pool, client, registry, pdf_id, &job.model_name, None, batch_size, job.force).await?;
            let source_id = pdf_id.to_string();
            ingestion_status::set_status(
                pool,
                "pdf",
                &source_id,
                "ready",
                serde_json::json!({ "stage": "ready", "job_id": job.id }),
            )
            .await?;
        }
        "unified_embed" => {
            let source_type = job
                .source_type
                .as_deref()
                .ok_or_else(|| RagError::Fatal(format!("unified_embed job {} has no source_type", job.id)))?;
            let source_id = job
                .source_id
                .as_deref()
                .ok_or_else(|| RagError::Fatal(format!("unified_embed job {} has no source_id", job.id)))?;
            embed_unified_chunks(pool, client, registry, source_type, source_id, &job.model_name, batch_size, job.force)
                .await?;
            ingestion_status::set_status(
                pool,
                source_type,
                source_id,
                "ready",
                serde_json::json!({ "stage": "ready", "job_id": job.id }),
            )
            .await?;
        }
        other => return Err(RagError::Fatal(format!("unknown job_type {other:?} on job {}", job.id))),
    }
    Ok(())
}
