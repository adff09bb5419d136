//! C6 Embedding Service: versioned batch embedding with idempotence,
//! atomic delete-then-reinsert for PDFs, and overwrite-in-place for
//! unified chunks.

use ferrumyx_common::error::{RagError, Result};
use ferrumyx_db::repo::{pdf, unified_chunks};
use ferrumyx_embed::{EmbeddingClient, ModelRegistry};
use pgvector::Vector;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EmbedSummary {
    pub embedded: usize,
    pub skipped: usize,
}

/// `embed_pdf(pdf_id, model_name, version?, batch_size?, force?)`.
pub async fn embed_pdf(
    pool: &PgPool,
    client: &dyn EmbeddingClient,
    registry: &ModelRegistry,
    pdf_id: Uuid,
    model_name: &str,
    version: Option<&str>,
    batch_size: Option<usize>,
    force: bool,
) -> Result<EmbedSummary> {
    let entry = registry.get(model_name).map_err(|e| RagError::InvalidArgument(e.to_string()))?;
    let version = version.unwrap_or(&entry.default_version).to_string();

    let chunks = pdf::chunks_for_pdf(pool, pdf_id).await?;
    if chunks.is_empty() {
        return Ok(EmbedSummary { embedded: 0, skipped: 0 });
    }

    if !force {
        let (existing_count, _) = pdf::embedding_count(pool, pdf_id, model_name).await?;
        let versions_match = pdf::all_versions_match(pool, pdf_id, model_name, &version).await?;
        if existing_count as usize == chunks.len() && versions_match {
            return Ok(EmbedSummary { embedded: 0, skipped: chunks.len() });
        }
    }

    let batch_size = registry
        .effective_batch_size(model_name, batch_size)
        .map_err(|e| RagError::InvalidArgument(e.to_string()))?;

    let mut sorted = chunks;
    sorted.sort_by_key(|c| c.id);

    let mut rows: Vec<(Uuid, Vector)> = Vec::with_capacity(sorted.len());
    for batch in sorted.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = client.embed(&texts).await.map_err(|e| RagError::ProviderProtocolError(e.to_string()))?;
        if vectors.len() != batch.len() {
            return Err(RagError::ProviderProtocolError(format!(
                "embedding client returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        for (chunk, vector) in batch.iter().zip(vectors) {
            rows.push((chunk.id, Vector::from(vector)));
        }
    }

    let dimensions = entry.dimensions as i32;
    pdf::replace_embeddings(pool, pdf_id, model_name, &version, dimensions, &rows).await?;
    info!(pdf_id = %pdf_id, model_name, version, count = rows.len(), "embedded pdf chunks");

    Ok(EmbedSummary { embedded: rows.len(), skipped: 0 })
}

/// `embed_unified_chunks(source_type, source_id, model_name, batch_size?, force?)`.
/// Never deletes rows: only overwrites the `embedding` column on the
/// targeted chunks, since `unified_chunks` carries no versioned embedding
/// row set the way PDFs do.
pub async fn embed_unified_chunks(
    pool: &PgPool,
    client: &dyn EmbeddingClient,
    registry: &ModelRegistry,
    source_type: &str,
    source_id: &str,
    model_name: &str,
    batch_size: Option<usize>,
    force: bool,
) -> Result<EmbedSummary> {
    registry.get(model_name).map_err(|e| RagError::InvalidArgument(e.to_string()))?;
    let batch_size = registry
        .effective_batch_size(model_name, batch_size)
        .map_err(|e| RagError::InvalidArgument(e.to_string()))?;

    let all_count = unified_chunks::all_chunks(pool, source_type, source_id).await?.len();
    let target_chunks = if force {
        unified_chunks::all_chunks(pool, source_type, source_id).await?
    } else {
        unified_chunks::chunks_missing_embedding(pool, source_type, source_id).await?
    };
    let skipped = all_count - target_chunks.len();

    if target_chunks.is_empty() {
        return Ok(EmbedSummary { embedded: 0, skipped });
    }

    let mut embedded = 0usize;
    for batch in target_chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.chunk_text.clone()).collect();
        let vectors = client.embed(&texts).await.map_err(|e| RagError::ProviderProtocolError(e.to_string()))?;
        if vectors.len() != batch.len() {
            return Err(RagError::ProviderProtocolError(format!(
                "embedding client returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        for (chunk, vector) in batch.iter().zip(vectors) {
            unified_chunks::set_embedding(pool, chunk.id, &Vector::from(vector)).await?;
            embedded += 1;
        }
    }

    info!(source_type, source_id, model_name, embedded, "embedded unified chunks");
    Ok(EmbedSummary { embedded, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_defaults_to_zero() {
        let s = EmbedSummary::default();
        assert_eq!(s.embedded, 0);
        assert_eq!(s.skipped, 0);
    }
}
