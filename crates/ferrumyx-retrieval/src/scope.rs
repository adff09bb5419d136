//! The two retrieval scopes C1/C2 can bind to: a single PDF under a named
//! embedding model, or a `(source_type, source_id)` slice of the unified
//! chunk store. Normalizes both into the scope-agnostic candidate types
//! C3 onward operate on.

use ferrumyx_common::error::{RagError, Result};
use ferrumyx_common::metadata::{Metadata, PdfChunkMeta};
use ferrumyx_db::models::UnifiedChunk;
use ferrumyx_db::repo::{pdf, unified_chunks};
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{LexicalCandidate, VectorCandidate};

#[derive(Debug, Clone)]
pub enum Scope {
    Pdf { pdf_id: Uuid, model_name: String },
    Unified { source_type: String, source_id: String },
}

impl Scope {
    pub async fn vector_search(
        &self,
        pool: &PgPool,
        query_vector: &Vector,
        top_k: i64,
    ) -> Result<Vec<VectorCandidate>> {
        if query_vector.to_vec().is_empty() {
            return Err(RagError::InvalidArgument("query embedding must not be empty".into()));
        }
        let rows = match self {
            Scope::Pdf { pdf_id, model_name } => pdf::vector_search(pool, *pdf_id, model_name, query_vector, top_k)
                .await?
                .into_iter()
                .map(|(id, distance)| VectorCandidate { chunk_id: id.to_string(), distance })
                .collect(),
            Scope::Unified { source_type, source_id } => {
                unified_chunks::vector_search(pool, source_type, source_id, query_vector, top_k)
                    .await?
                    .into_iter()
                    .map(|(chunk_id, distance)| VectorCandidate { chunk_id, distance })
                    .collect()
            }
        };
        Ok(rows)
    }

    pub async fn lexical_search(
        &self,
        pool: &PgPool,
        query_text: &str,
        top_k: i64,
    ) -> Result<Vec<LexicalCandidate>> {
        let rows = match self {
            Scope::Pdf { pdf_id, .. } => pdf::lexical_search(pool, *pdf_id, query_text, top_k)
                .await?
                .into_iter()
                .map(|(id, _chunk_index, text, rank)| LexicalCandidate {
                    chunk_id: id.to_string(),
                    snippet: text,
                    rank: rank.max(0.0),
                })
                .collect(),
            Scope::Unified { source_type, source_id } => {
                unified_chunks::lexical_search(pool, source_type, source_id, query_text, top_k)
                    .await?
                    .into_iter()
                    .map(|(chunk_id, text, rank)| LexicalCandidate {
                        chunk_id,
                        snippet: text,
                        rank: rank.max(0.0),
                    })
                    .collect()
            }
        };
        Ok(rows)
    }

    /// One batched metadata/text hydration keyed by chunk id.
    pub async fn hydrate(&self, pool: &PgPool, chunk_ids: &[String]) -> Result<Vec<HydratedChunk>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let hydrated = match self {
            Scope::Pdf { pdf_id, .. } => {
                let all = pdf::chunks_for_pdf(pool, *pdf_id).await?;
                all.into_iter()
                    .filter(|c| chunk_ids.contains(&c.id.to_string()))
                    .map(|c| HydratedChunk {
                        chunk_id: c.id.to_string(),
                        text: c.text,
                        metadata: Metadata::PdfChunk(PdfChunkMeta {
                            chunk_index: c.chunk_index,
                            page_start: c.page_start,
                            page_end: c.page_end,
                            section_path: c.section_path,
                            is_table: c.is_table,
                            is_figure: c.is_figure,
                        })
                        .as_json(),
                        embedding: None,
                    })
                    .collect()
            }
            Scope::Unified { source_type, source_id } => {
                let rows: Vec<UnifiedChunk> =
                    unified_chunks::hydrate_by_chunk_ids(pool, source_type, source_id, chunk_ids).await?;
                rows.into_iter()
                    .map(|c| HydratedChunk {
                        chunk_id: c.chunk_id,
                        text: c.chunk_text,
                        metadata: c.chunk_metadata,
                        embedding: c.embedding.map(|v| v.to_vec()),
                    })
                    .collect()
            }
        };
        Ok(hydrated)
    }
}

#[derive(Debug, Clone)]
pub struct HydratedChunk {
    pub chunk_id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    pub embedding: Option<Vec<f32>>,
}
