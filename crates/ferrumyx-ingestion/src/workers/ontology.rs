//! The concrete ontology ingestion worker: parse OBO → delete/insert terms
//! + relations + unified chunks → INDEXING → forced embed → READY/ERROR.

use std::path::Path;

use ferrumyx_common::error::{RagError, Result};
use ferrumyx_common::metadata::{Metadata, OntologyTermMeta};
use ferrumyx_db::repo::ingestion_status;
use ferrumyx_db::repo::ontology::{self, NewOntologyRelation, NewOntologyTerm};
use ferrumyx_db::repo::unified_chunks::{self, NewUnifiedChunk};
use ferrumyx_embed::{EmbeddingClient, ModelRegistry};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};

use crate::embedding::embed_unified_chunks;
use crate::fingerprint::{fingerprint_file, FileFingerprint};
use crate::obo::{parse_obo, OboTerm};
use crate::workers::{embedding_summary_json, fail_ingestion, file_info_json, no_op_embedding_summary};

#[derive(Debug, Clone, serde::Serialize)]
pub struct OntologyIngestSummary {
    pub deleted_terms: u64,
    pub deleted_relations: u64,
    pub inserted_terms: u64,
    pub inserted_relations: u64,
    pub inserted_chunks: u64,
    pub embedded: usize,
    pub status: String,
}

pub async fn ingest_ontology(
    pool: &PgPool,
    client: &dyn EmbeddingClient,
    registry: &ModelRegistry,
    ontology_type: &str,
    source_id: &str,
    file_path: &Path,
    model_name: &str,
    auto_embed: bool,
) -> Result<OntologyIngestSummary> {
    let source_type = format!("ontology_{ontology_type}");
    let fingerprint = fingerprint_file(file_path)?;
    let content = std::fs::read_to_string(file_path)
        .map_err(|e| RagError::InvalidArgument(format!("cannot read {}: {e}", file_path.display())))?;
    let terms = parse_obo(&content)?;

    let mut tx = pool.begin().await?;
    if !ingestion_status::try_lock_scope(&mut tx, &source_type, source_id).await? {
        return Err(RagError::Conflict(format!("ingestion already in progress for {source_type}:{source_id}")));
    }

    let counts = match reindex_scope(&mut tx, ontology_type, &source_type, source_id, &terms, &fingerprint).await {
        Ok(counts) => counts,
        Err(e) => return Err(fail_ingestion(pool, &source_type, source_id, e).await),
    };
    if let Err(e) = tx.commit().await {
        return Err(fail_ingestion(pool, &source_type, source_id, e.into()).await);
    }
    let (deleted_terms, deleted_relations, inserted_terms, inserted_relations, chunk_count) = counts;

    ingestion_status::set_status(
        pool,
        &source_type,
        source_id,
        "indexing",
        json!({
            "stage": "embedding_pending",
            "file_info": file_info_json(&fingerprint),
            "deleted": {"terms": deleted_terms, "relations": deleted_relations},
            "inserted": {"terms": inserted_terms, "relations": inserted_relations, "chunks": chunk_count},
        }),
    )
    .await?;

    // Always forced: the rows were just fully replaced, so nothing is
    // "already embedded" in the idempotence sense embed_unified_chunks
    // otherwise checks.
    let embed_summary = if auto_embed {
        match embed_unified_chunks(pool, client, registry, &source_type, source_id, model_name, None, true).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(source_type = %source_type, source_id, error = %e, "ontology embedding failed");
                ingestion_status::set_status(
                    pool,
                    &source_type,
                    source_id,
                    "error",
                    json!({ "stage": "error", "embedding": {"error": e.to_string()} }),
                )
                .await?;
                return Err(e);
            }
        }
    } else {
        no_op_embedding_summary(chunk_count as usize)
    };

    let stage = if embed_summary.embedded > 0 { "ready" } else { "awaiting_embeddings" };
    let status = if embed_summary.embedded > 0 { "ready" } else { "indexing" };
    ingestion_status::set_status(
        pool,
        &source_type,
        source_id,
        status,
        json!({
            "stage": stage,
            "file_info": file_info_json(&fingerprint),
            "deleted": {"terms": deleted_terms, "relations": deleted_relations},
            "inserted": {"terms": inserted_terms, "relations": inserted_relations, "chunks": chunk_count},
            "embedding": embedding_summary_json(&embed_summary),
        }),
    )
    .await?;

    info!(source_type = %source_type, source_id, inserted_terms, inserted_relations, "ontology ingestion complete");

    Ok(OntologyIngestSummary {
        deleted_terms,
        deleted_relations,
        inserted_terms,
        inserted_relations,
        inserted_chunks: chunk_count,
        embedded: embed_summary.embedded,
        status: status.to_string(),
    })
}

/// Parse result is already in hand; delete the prior term/relation/chunk
/// set, insert the new one, and record the first "indexing" status write,
/// all against the caller's transaction so they commit or roll back as
/// one unit. Returns `(deleted_terms, deleted_relations, inserted_terms,
/// inserted_relations, inserted_chunks)`.
async fn reindex_scope<'a>(
    tx: &mut Transaction<'a, Postgres>,
    ontology_type: &str,
    source_type: &str,
    source_id: &str,
    terms: &[OboTerm],
    fingerprint: &FileFingerprint,
) -> Result<(u64, u64, u64, u64, u64)> {
    let (deleted_terms, deleted_relations) = ontology::delete_scope(tx, ontology_type, source_id).await?;
    unified_chunks::delete_by_scope(tx, source_type, source_id).await?;

    let new_terms: Vec<NewOntologyTerm> = terms
        .iter()
        .map(|t| NewOntologyTerm {
            term_id: t.id.clone(),
            name: t.name.clone(),
            definition: t.def.clone(),
            synonyms: t.synonyms.clone(),
            xrefs: t.xrefs.clone(),
            term_metadata: json!({}),
        })
        .collect();
    let inserted_terms = ontology::insert_terms(tx, ontology_type, source_id, &new_terms).await?;

    let new_relations: Vec<NewOntologyRelation> = terms
        .iter()
        .flat_map(|t| {
            t.is_a.iter().map(move |parent| NewOntologyRelation {
                child_term_id: t.id.clone(),
                parent_term_id: parent.clone(),
                relation_type: "is_a".to_string(),
            })
        })
        .collect();
    let inserted_relations = ontology::insert_relations(tx, ontology_type, source_id, &new_relations).await?;

    let chunks: Vec<NewUnifiedChunk> =
        terms.iter().map(|t| term_to_chunk(ontology_type, source_type, source_id, t)).collect();
    let chunk_count = chunks.len() as u64;
    unified_chunks::insert_batch(tx, &chunks).await?;

    ingestion_status::set_status_tx(
        tx,
        source_type,
        source_id,
        "indexing",
        json!({
            "stage": "indexing",
            "file_info": file_info_json(fingerprint),
            "deleted": {"terms": deleted_terms, "relations": deleted_relations},
        }),
    )
    .await?;

    Ok((deleted_terms, deleted_relations, inserted_terms, inserted_relations, chunk_count))
}

fn term_to_chunk(ontology_type: &str, source_type: &str, source_id: &str, term: &OboTerm) -> NewUnifiedChunk {
    let mut text = term.name.clone();
    if let Some(def) = &term.def {
        text.push_str(". ");
        text.push_str(def);
    }
    if !term.synonyms.is_empty() {
        text.push_str(" Synonyms: ");
        text.push_str(&term.synonyms.join(", "));
    }
    NewUnifiedChunk {
        source_type: source_type.to_string(),
        source_id: source_id.to_string(),
        chunk_id: term.id.clone(),
        chunk_text: text,
        chunk_metadata: Metadata::OntologyTerm(OntologyTermMeta {
            ontology_type: ontology_type.to_string(),
            term_id: term.id.clone(),
            name: term.name.clone(),
            synonyms: term.synonyms.clone(),
            xrefs: term.xrefs.clone(),
        })
        .as_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_to_chunk_includes_definition_and_synonyms() {
        let term = OboTerm {
            id: "GO:1".into(),
            name: "root".into(),
            def: Some("the root term".into()),
            synonyms: vec!["base".into()],
            is_a: vec![],
            xrefs: vec![],
        };
        let chunk = term_to_chunk("go", "ontology_go", "all", &term);
        assert!(chunk.chunk_text.contains("the root term"));
        assert!(chunk.chunk_text.contains("base"));
        assert_eq!(chunk.chunk_id, "GO:1");
        assert_eq!(chunk.chunk_metadata["kind"], "ontology_term");
        assert_eq!(chunk.chunk_metadata["ontology_type"], "go");
    }
}
