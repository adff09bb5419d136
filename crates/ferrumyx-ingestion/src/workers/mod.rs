//! C9 Ingestion Workers: fingerprint → delete → insert → INDEXING →
//! embed → READY/ERROR, serialized per scope by a Postgres advisory lock.

pub mod job_worker;
pub mod ontology;
pub mod pdf;

use ferrumyx_common::error::RagError;
use ferrumyx_db::repo::ingestion_status;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::error;

use crate::embedding::EmbedSummary;
use crate::fingerprint::FileFingerprint;

pub(crate) fn file_info_json(fp: &FileFingerprint) -> Value {
    json!({
        "path": fp.path,
        "size_bytes": fp.size_bytes,
        "modified_at": fp.modified_at,
        "sha256": fp.sha256,
    })
}

pub(crate) fn embedding_summary_json(summary: &EmbedSummary) -> Value {
    json!({ "embedded": summary.embedded, "skipped": summary.skipped })
}

/// A synthetic no-op embedding summary for when `auto_embed` was not
/// requested, so the "ready"/"awaiting_embeddings" status payload stays
/// shaped consistently whether or not embedding actually ran.
pub(crate) fn no_op_embedding_summary(chunk_total: usize) -> EmbedSummary {
    EmbedSummary { embedded: 0, skipped: chunk_total }
}

/// Records an `ERROR` ingestion-status row for failures that happen while
/// parsing/deleting/inserting a scope's chunks, then returns the error
/// unchanged so the caller can still propagate it. `InvalidArgument` (a
/// caller mistake, not an ingestion failure) and `Conflict` (another
/// worker already holds the scope's lock) never overwrite the existing
/// status row for that reason.
pub(crate) async fn fail_ingestion(
    pool: &PgPool,
    source_type: &str,
    source_id: &str,
    err: RagError,
) -> RagError {
    if matches!(err, RagError::InvalidArgument(_) | RagError::Conflict(_)) {
        return err;
    }
    let message = json!({ "stage": "error", "error": err.to_string() });
    if let Err(set_err) = ingestion_status::set_status(pool, source_type, source_id, "error", message).await {
        error!(source_type, source_id, error = %set_err, "failed to record ingestion error status");
    }
    err
}
