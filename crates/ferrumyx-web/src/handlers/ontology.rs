//! Ontology ingestion endpoints: list/get status, trigger ingestion,
//! trigger (re)embedding.

use axum::extract::{Path, State};
use axum::Json;
use ferrumyx_common::error::{ApiError, RagError};
use ferrumyx_db::models::IndexStatus;
use ferrumyx_db::repo::ingestion_status;
use ferrumyx_db::repo::jobs::{self, JobTarget, NewEmbeddingJob};
use serde::Deserialize;
use serde_json::Value;

use crate::sse::AppEvent;
use crate::state::SharedState;

pub async fn list_ingestions(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let rows = ingestion_status::list(&state.pool).await.map_err(RagError::from)?;
    Ok(Json(serde_json::to_value(rows).unwrap_or(Value::Null)))
}

pub async fn get_ingestion(
    State(state): State<SharedState>,
    Path((ontology_type, source_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let source_type = format!("ontology_{ontology_type}");
    let row = ingestion_status::get(&state.pool, &source_type, &source_id)
        .await
        .map_err(RagError::from)?
        .ok_or_else(|| RagError::NotFound(format!("no ingestion status for {source_type}:{source_id}")))?;
    Ok(Json(serde_json::to_value(row).unwrap_or(Value::Null)))
}

#[derive(Debug, Deserialize)]
pub struct TriggerIngestionRequest {
    pub ontology_type: String,
    pub source_id: String,
}

pub async fn trigger_ingestion(
    State(state): State<SharedState>,
    Json(req): Json<TriggerIngestionRequest>,
) -> Result<Json<Value>, ApiError> {
    let source_type = format!("ontology_{}", req.ontology_type);
    let adapter = state
        .adapters
        .resolve(&source_type)
        .ok_or_else(|| RagError::InvalidArgument(format!("no adapter registered for {source_type}")))?;

    let status = adapter.ingest(&state.pool, &source_type, &req.source_id).await?;
    let _ = state.events.send(AppEvent::IngestionStatusChanged {
        source_type: source_type.clone(),
        source_id: req.source_id.clone(),
        status: status.as_str().to_string(),
    });

    Ok(Json(serde_json::json!({
        "source_type": source_type,
        "source_id": req.source_id,
        "status": status.as_str(),
    })))
}

#[derive(Debug, Deserialize, Default)]
pub struct TriggerEmbeddingRequest {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub force: Option<bool>,
}

/// Enqueues a background embedding job rather than embedding inline —
/// the HTTP path only ever submits work to the durable queue table; the
/// background worker (see `ferrumyx_ingestion::workers::job_worker`) is
/// what actually calls `embed_unified_chunks`.
pub async fn trigger_embeddings(
    State(state): State<SharedState>,
    Path((ontology_type, source_id)): Path<(String, String)>,
    Json(req): Json<TriggerEmbeddingRequest>,
) -> Result<Json<Value>, ApiError> {
    let source_type = format!("ontology_{ontology_type}");
    let model_name = req.model_name.unwrap_or_else(|| state.config.default_embedding_model.clone());
    let force = req.force.unwrap_or(true);

    let job = jobs::enqueue(
        &state.pool,
        NewEmbeddingJob {
            target: JobTarget::Unified { source_type: source_type.clone(), source_id: source_id.clone() },
            model_name,
            batch_size: req.batch_size.map(|n| n as i32),
            force,
            priority: 0,
        },
    )
    .await
    .map_err(RagError::from)?;

    let _ = state.events.send(AppEvent::IngestionStatusChanged {
        source_type: source_type.clone(),
        source_id: source_id.clone(),
        status: IndexStatus::Indexing.as_str().to_string(),
    });

    Ok(Json(serde_json::json!({
        "job_id": job.id,
        "source_type": source_type,
        "source_id": source_id,
        "status": job.status,
    })))
}
