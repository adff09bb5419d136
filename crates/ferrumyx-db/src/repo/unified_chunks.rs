//! Queries against `unified_chunks`: the shared retrieval surface for C1
//! (vector search), C2 (lexical search), and C9 (ingestion upsert/delete).

use pgvector::Vector;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::UnifiedChunk;

#[derive(Debug, Clone)]
pub struct NewUnifiedChunk {
    pub source_type: String,
    pub source_id: String,
    pub chunk_id: String,
    pub chunk_text: String,
    pub chunk_metadata: Value,
}

/// Delete every chunk for `(source_type, source_id)`. Returns the number
/// of rows removed, recorded verbatim in ingestion status messages. Runs
/// against the caller's transaction so the delete, the reinsert, and the
/// first status write commit or roll back together.
pub async fn delete_by_scope<'a>(
    tx: &mut Transaction<'a, Postgres>,
    source_type: &str,
    source_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM unified_chunks WHERE source_type = $1 AND source_id = $2",
    )
    .bind(source_type)
    .bind(source_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Bulk-insert new chunks for a scope. `search_vector` is a generated
/// column (`to_tsvector('english', chunk_text)` stored), so it is never
/// written directly — it recomputes whenever `chunk_text` changes.
pub async fn insert_batch<'a>(
    tx: &mut Transaction<'a, Postgres>,
    chunks: &[NewUnifiedChunk],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0u64;
    for c in chunks {
        sqlx::query(
            "INSERT INTO unified_chunks (id, source_type, source_id, chunk_id, chunk_text, chunk_metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, now())
             ON CONFLICT (source_type, source_id, chunk_id)
             DO UPDATE SET chunk_text = EXCLUDED.chunk_text, chunk_metadata = EXCLUDED.chunk_metadata",
        )
        .bind(Uuid::new_v4())
        .bind(&c.source_type)
        .bind(&c.source_id)
        .bind(&c.chunk_id)
        .bind(&c.chunk_text)
        .bind(&c.chunk_metadata)
        .execute(&mut **tx)
        .await?;
        inserted += 1;
    }
    Ok(inserted)
}

/// C1 Vector Search: k-NN under cosine distance (pgvector's `<=>` operator).
/// `top_k <= 0` short-circuits to an empty list without issuing a query.
pub async fn vector_search(
    pool: &PgPool,
    source_type: &str,
    source_id: &str,
    query_vector: &Vector,
    top_k: i64,
) -> Result<Vec<(String, f32)>, sqlx::Error> {
    if top_k <= 0 {
        return Ok(Vec::new());
    }
    let rows: Vec<(String, f32)> = sqlx::query_as(
        "SELECT chunk_id, (embedding <=> $1) AS distance
         FROM unified_chunks
         WHERE source_type = $2 AND source_id = $3 AND embedding IS NOT NULL
         ORDER BY embedding <=> $1
         LIMIT $4",
    )
    .bind(query_vector)
    .bind(source_type)
    .bind(source_id)
    .bind(top_k)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// C2 Lexical Search over the unified scope. No PDF chunk-index join is
/// possible here, so ties are broken by `chunk_id ASC` for determinism
/// (the distilled spec leaves this tiebreaker unresolved; see DESIGN.md).
pub async fn lexical_search(
    pool: &PgPool,
    source_type: &str,
    source_id: &str,
    query_text: &str,
    top_k: i64,
) -> Result<Vec<(String, String, f32)>, sqlx::Error> {
    if top_k <= 0 || query_text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<(String, String, f32)> = sqlx::query_as(
        "SELECT chunk_id, chunk_text,
                COALESCE(ts_rank(search_vector, plainto_tsquery('english', $1)), 0.0) AS rank
         FROM unified_chunks
         WHERE source_type = $2 AND source_id = $3
           AND search_vector @@ plainto_tsquery('english', $1)
         ORDER BY rank DESC, chunk_id ASC
         LIMIT $4",
    )
    .bind(query_text)
    .bind(source_type)
    .bind(source_id)
    .bind(top_k)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// C3's batched metadata hydration step: one `WHERE chunk_id = ANY($1)`
/// lookup keyed by chunk id, scoped to the same source.
pub async fn hydrate_by_chunk_ids(
    pool: &PgPool,
    source_type: &str,
    source_id: &str,
    chunk_ids: &[String],
) -> Result<Vec<UnifiedChunk>, sqlx::Error> {
    if chunk_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, UnifiedChunk>(
        "SELECT id, source_type, source_id, chunk_id, chunk_text, chunk_metadata, embedding, created_at
         FROM unified_chunks
         WHERE source_type = $1 AND source_id = $2 AND chunk_id = ANY($3)",
    )
    .bind(source_type)
    .bind(source_id)
    .bind(chunk_ids)
    .fetch_all(pool)
    .await
}

/// Chunks in a scope lacking an embedding (the unified-chunk path's
/// default target set when `force=false`).
pub async fn chunks_missing_embedding(
    pool: &PgPool,
    source_type: &str,
    source_id: &str,
) -> Result<Vec<UnifiedChunk>, sqlx::Error> {
    sqlx::query_as::<_, UnifiedChunk>(
        "SELECT id, source_type, source_id, chunk_id, chunk_text, chunk_metadata, embedding, created_at
         FROM unified_chunks
         WHERE source_type = $1 AND source_id = $2 AND embedding IS NULL",
    )
    .bind(source_type)
    .bind(source_id)
    .fetch_all(pool)
    .await
}

pub async fn all_chunks(
    pool: &PgPool,
    source_type: &str,
    source_id: &str,
) -> Result<Vec<UnifiedChunk>, sqlx::Error> {
    sqlx::query_as::<_, UnifiedChunk>(
        "SELECT id, source_type, source_id, chunk_id, chunk_text, chunk_metadata, embedding, created_at
         FROM unified_chunks
         WHERE source_type = $1 AND source_id = $2",
    )
    .bind(source_type)
    .bind(source_id)
    .fetch_all(pool)
    .await
}

/// Overwrite the `embedding` column for one chunk. The unified path never
/// deletes rows the way the PDF path does — it only targets chunks lacking
/// an embedding (or all of them under `force=true`).
pub async fn set_embedding(
    pool: &PgPool,
    id: Uuid,
    embedding: &Vector,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE unified_chunks SET embedding = $1 WHERE id = $2")
        .bind(embedding)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
