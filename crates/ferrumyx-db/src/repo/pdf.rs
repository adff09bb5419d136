//! Queries for the PDF-specific denormalization: `pdf_documents`,
//! `pdf_chunks`, `pdf_embeddings`.

use pgvector::Vector;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{EmbeddingModelEntry, PdfChunk, PdfDocument, PdfEmbedding};

pub async fn get_document(pool: &PgPool, pdf_id: Uuid) -> Result<Option<PdfDocument>, sqlx::Error> {
    sqlx::query_as::<_, PdfDocument>(
        "SELECT id, title, embeddings_generated, embedding_models, created_at, updated_at
         FROM pdf_documents WHERE id = $1",
    )
    .bind(pdf_id)
    .fetch_optional(pool)
    .await
}

pub async fn chunks_for_pdf(pool: &PgPool, pdf_id: Uuid) -> Result<Vec<PdfChunk>, sqlx::Error> {
    sqlx::query_as::<_, PdfChunk>(
        "SELECT id, pdf_id, chunk_index, text, page_start, page_end, section_path, is_table, is_figure
         FROM pdf_chunks WHERE pdf_id = $1 ORDER BY chunk_index ASC",
    )
    .bind(pdf_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone)]
pub struct NewPdfChunk {
    pub chunk_index: i32,
    pub text: String,
    pub page_start: i32,
    pub page_end: i32,
    pub section_path: Option<String>,
    pub is_table: bool,
    pub is_figure: bool,
}

/// Delete every chunk owned by a PDF. Ingestion re-runs always delete
/// before insert; the count is recorded in the status message verbatim.
/// Runs against the caller's transaction so the delete, the reinsert,
/// and the first status write commit or roll back together.
pub async fn delete_chunks<'a>(tx: &mut Transaction<'a, Postgres>, pdf_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pdf_chunks WHERE pdf_id = $1").bind(pdf_id).execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

pub async fn insert_chunks<'a>(
    tx: &mut Transaction<'a, Postgres>,
    pdf_id: Uuid,
    chunks: &[NewPdfChunk],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0u64;
    for c in chunks {
        sqlx::query(
            "INSERT INTO pdf_chunks (id, pdf_id, chunk_index, text, page_start, page_end, section_path, is_table, is_figure)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::new_v4())
        .bind(pdf_id)
        .bind(c.chunk_index)
        .bind(&c.text)
        .bind(c.page_start)
        .bind(c.page_end)
        .bind(&c.section_path)
        .bind(c.is_table)
        .bind(c.is_figure)
        .execute(&mut **tx)
        .await?;
        inserted += 1;
    }
    Ok(inserted)
}

pub async fn create_document(pool: &PgPool, title: &str) -> Result<Uuid, sqlx::Error> {
    let id: (Uuid,) = sqlx::query_as(
        "INSERT INTO pdf_documents (id, title, embeddings_generated, embedding_models, created_at, updated_at)
         VALUES ($1, $2, false, '[]'::jsonb, now(), now()) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .fetch_one(pool)
    .await?;
    Ok(id.0)
}

/// C1 Vector Search scoped to a PDF + model name.
pub async fn vector_search(
    pool: &PgPool,
    pdf_id: Uuid,
    model_name: &str,
    query_vector: &Vector,
    top_k: i64,
) -> Result<Vec<(Uuid, f32)>, sqlx::Error> {
    if top_k <= 0 {
        return Ok(Vec::new());
    }
    sqlx::query_as(
        "SELECT e.chunk_id, (e.vector <=> $1) AS distance
         FROM pdf_embeddings e
         WHERE e.pdf_id = $2 AND e.model_name = $3
         ORDER BY e.vector <=> $1
         LIMIT $4",
    )
    .bind(query_vector)
    .bind(pdf_id)
    .bind(model_name)
    .bind(top_k)
    .fetch_all(pool)
    .await
}

/// C2 Lexical Search scoped to a PDF, joined against `pdf_chunks` so ties
/// can break on `chunk_index ASC`.
pub async fn lexical_search(
    pool: &PgPool,
    pdf_id: Uuid,
    query_text: &str,
    top_k: i64,
) -> Result<Vec<(Uuid, i32, String, f32)>, sqlx::Error> {
    if top_k <= 0 || query_text.trim().is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as(
        "SELECT c.id, c.chunk_index, c.text,
                COALESCE(ts_rank(to_tsvector('english', c.text), plainto_tsquery('english', $1)), 0.0) AS rank
         FROM pdf_chunks c
         WHERE c.pdf_id = $2
           AND to_tsvector('english', c.text) @@ plainto_tsquery('english', $1)
         ORDER BY rank DESC, c.chunk_index ASC
         LIMIT $3",
    )
    .bind(query_text)
    .bind(pdf_id)
    .bind(top_k)
    .fetch_all(pool)
    .await
}

pub async fn embedding_count(
    pool: &PgPool,
    pdf_id: Uuid,
    model_name: &str,
) -> Result<(i64, Option<String>), sqlx::Error> {
    let row: (i64, Option<String>) = sqlx::query_as(
        "SELECT count(*), min(model_version) FROM pdf_embeddings WHERE pdf_id = $1 AND model_name = $2",
    )
    .bind(pdf_id)
    .bind(model_name)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Every existing row's `model_version` must equal `version` for the
/// idempotence check in §4.6 to short-circuit.
pub async fn all_versions_match(
    pool: &PgPool,
    pdf_id: Uuid,
    model_name: &str,
    version: &str,
) -> Result<bool, sqlx::Error> {
    let mismatched: (i64,) = sqlx::query_as(
        "SELECT count(*) FROM pdf_embeddings WHERE pdf_id = $1 AND model_name = $2 AND model_version <> $3",
    )
    .bind(pdf_id)
    .bind(model_name)
    .bind(version)
    .fetch_one(pool)
    .await?;
    Ok(mismatched.0 == 0)
}

/// Atomic delete-then-reinsert of the `(pdf_id, model_name)` embedding set,
/// plus an in-place upsert of the document's `embedding_models` entry.
pub async fn replace_embeddings(
    pool: &PgPool,
    pdf_id: Uuid,
    model_name: &str,
    version: &str,
    dimensions: i32,
    rows: &[(Uuid, Vector)],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM pdf_embeddings WHERE pdf_id = $1 AND model_name = $2")
        .bind(pdf_id)
        .bind(model_name)
        .execute(&mut *tx)
        .await?;

    // Stable ordering by chunk id so row order is deterministic across runs.
    let mut sorted = rows.to_vec();
    sorted.sort_by_key(|(chunk_id, _)| *chunk_id);

    for (chunk_id, vector) in &sorted {
        sqlx::query(
            "INSERT INTO pdf_embeddings (id, pdf_id, chunk_id, model_name, model_version, dimensions, vector)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(pdf_id)
        .bind(chunk_id)
        .bind(model_name)
        .bind(version)
        .bind(dimensions)
        .bind(vector)
        .execute(&mut *tx)
        .await?;
    }

    let doc: Value = sqlx::query_scalar("SELECT embedding_models FROM pdf_documents WHERE id = $1")
        .bind(pdf_id)
        .fetch_one(&mut *tx)
        .await?;
    let mut entries: Vec<EmbeddingModelEntry> =
        serde_json::from_value(doc).unwrap_or_default();
    let new_entry = EmbeddingModelEntry {
        model: model_name.to_string(),
        version: version.to_string(),
        dimensions,
    };
    if let Some(existing) = entries.iter_mut().find(|e| e.model == model_name) {
        *existing = new_entry;
    } else {
        entries.push(new_entry);
    }
    let entries_json = serde_json::to_value(&entries).unwrap_or(Value::Array(vec![]));

    sqlx::query(
        "UPDATE pdf_documents SET embeddings_generated = true, embedding_models = $1, updated_at = now() WHERE id = $2",
    )
    .bind(entries_json)
    .bind(pdf_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn all_pdf_embeddings(
    pool: &PgPool,
    pdf_id: Uuid,
    model_name: &str,
) -> Result<Vec<PdfEmbedding>, sqlx::Error> {
    sqlx::query_as::<_, PdfEmbedding>(
        "SELECT id, pdf_id, chunk_id, model_name, model_version, dimensions, vector
         FROM pdf_embeddings WHERE pdf_id = $1 AND model_name = $2",
    )
    .bind(pdf_id)
    .bind(model_name)
    .fetch_all(pool)
    .await
}
