//! `POST /api/rag/sessions` — create a session bound to a PDF.

use axum::extract::State;
use axum::Json;
use ferrumyx_common::error::{ApiError, RagError};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub pdf_id: Uuid,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub rag_config: Option<Value>,
}

pub async fn create_session(
    State(state): State<SharedState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let session_name = req.session_name.unwrap_or_else(|| format!("session-{}", Uuid::new_v4()));
    let rag_config = req.rag_config.unwrap_or_else(|| json!({}));

    ferrumyx_db::repo::pdf::get_document(&state.pool, req.pdf_id)
        .await
        .map_err(RagError::from)?
        .ok_or_else(|| RagError::NotFound(format!("pdf {} not found", req.pdf_id)))?;

    let session = ferrumyx_db::repo::chat::create_session(&state.pool, req.pdf_id, &session_name, rag_config)
        .await
        .map_err(RagError::from)?;

    Ok(Json(serde_json::to_value(session).unwrap_or(Value::Null)))
}
