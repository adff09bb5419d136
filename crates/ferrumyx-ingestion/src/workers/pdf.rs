//! The concrete PDF ingestion worker: parse → chunk → delete/insert →
//! INDEXING → optional embed → READY/ERROR.

use std::path::Path;

use ferrumyx_common::error::{RagError, Result};
use ferrumyx_db::repo::ingestion_status;
use ferrumyx_db::repo::pdf::{self, NewPdfChunk};
use ferrumyx_embed::{EmbeddingClient, ModelRegistry};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunker::{chunk_pdf, ChunkerConfig};
use crate::embedding::embed_pdf as embed_pdf_chunks;
use crate::fingerprint::{fingerprint_file, FileFingerprint};
use crate::pdf_parser::parse_pdf;
use crate::workers::{embedding_summary_json, fail_ingestion, file_info_json, no_op_embedding_summary};

const SOURCE_TYPE: &str = "pdf";

#[derive(Debug, Clone, serde::Serialize)]
pub struct PdfIngestSummary {
    pub deleted_chunks: u64,
    pub inserted_chunks: u64,
    pub embedded: usize,
    pub skipped: usize,
    pub status: String,
}

pub async fn ingest_pdf(
    pool: &PgPool,
    client: &dyn EmbeddingClient,
    registry: &ModelRegistry,
    pdf_id: Uuid,
    file_path: &Path,
    model_name: &str,
    auto_embed: bool,
) -> Result<PdfIngestSummary> {
    let scope_id = pdf_id.to_string();
    let fingerprint = fingerprint_file(file_path)?;

    // The advisory lock is scoped to this transaction's lifetime, not to
    // the connection doing the actual writes below; holding it open until
    // after delete+insert+first status write is what serializes concurrent
    // re-ingests of the same pdf_id.
    let mut tx = pool.begin().await?;
    if !ingestion_status::try_lock_scope(&mut tx, SOURCE_TYPE, &scope_id).await? {
        return Err(RagError::Conflict(format!("ingestion already in progress for pdf {pdf_id}")));
    }

    let (deleted, inserted) = match reindex_chunks(&mut tx, pdf_id, file_path, &fingerprint, &scope_id).await {
        Ok(counts) => counts,
        Err(e) => return Err(fail_ingestion(pool, SOURCE_TYPE, &scope_id, e).await),
    };
    if let Err(e) = tx.commit().await {
        return Err(fail_ingestion(pool, SOURCE_TYPE, &scope_id, e.into()).await);
    }

    ingestion_status::set_status(
        pool,
        SOURCE_TYPE,
        &scope_id,
        "indexing",
        json!({
            "stage": "embedding_pending",
            "file_info": file_info_json(&fingerprint),
            "deleted": {"chunks": deleted},
            "inserted": {"chunks": inserted},
        }),
    )
    .await?;

    let embed_summary = if auto_embed {
        match embed_pdf_chunks(pool, client, registry, pdf_id, model_name, None, None, true).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(pdf_id = %pdf_id, error = %e, "pdf embedding failed");
                ingestion_status::set_status(
                    pool,
                    SOURCE_TYPE,
                    &scope_id,
                    "error",
                    json!({ "stage": "error", "embedding": {"error": e.to_string()} }),
                )
                .await?;
                return Err(e);
            }
        }
    } else {
        no_op_embedding_summary(inserted as usize)
    };

    let stage = if embed_summary.embedded > 0 { "ready" } else { "awaiting_embeddings" };
    let status = if embed_summary.embedded > 0 { "ready" } else { "indexing" };
    ingestion_status::set_status(
        pool,
        SOURCE_TYPE,
        &scope_id,
        status,
        json!({
            "stage": stage,
            "file_info": file_info_json(&fingerprint),
            "deleted": {"chunks": deleted},
            "inserted": {"chunks": inserted},
            "embedding": embedding_summary_json(&embed_summary),
        }),
    )
    .await?;

    info!(pdf_id = %pdf_id, deleted, inserted, embedded = embed_summary.embedded, "pdf ingestion complete");

    Ok(PdfIngestSummary {
        deleted_chunks: deleted,
        inserted_chunks: inserted,
        embedded: embed_summary.embedded,
        skipped: embed_summary.skipped,
        status: status.to_string(),
    })
}

/// Parse, delete the prior chunk set, insert the new one, and record the
/// first "indexing" status write, all against the caller's transaction so
/// they commit or roll back as one unit.
async fn reindex_chunks<'a>(
    tx: &mut Transaction<'a, Postgres>,
    pdf_id: Uuid,
    file_path: &Path,
    fingerprint: &FileFingerprint,
    scope_id: &str,
) -> Result<(u64, u64)> {
    let parsed = parse_pdf(file_path)?;
    let drafts = chunk_pdf(&parsed, &ChunkerConfig::default());

    let deleted = pdf::delete_chunks(tx, pdf_id).await?;
    let new_chunks: Vec<NewPdfChunk> = drafts
        .iter()
        .map(|d| NewPdfChunk {
            chunk_index: d.chunk_index,
            text: d.text.clone(),
            page_start: d.page_start,
            page_end: d.page_end,
            section_path: d.section_path.clone(),
            is_table: d.is_table,
            is_figure: d.is_figure,
        })
        .collect();
    let inserted = pdf::insert_chunks(tx, pdf_id, &new_chunks).await?;

    ingestion_status::set_status_tx(
        tx,
        SOURCE_TYPE,
        scope_id,
        "indexing",
        json!({ "stage": "indexing", "file_info": file_info_json(fingerprint), "deleted": {"chunks": deleted} }),
    )
    .await?;

    Ok((deleted, inserted))
}
