//! `POST /api/rag/sessions/{id}/question` — JSON or SSE, selected by the
//! request's `Accept` header, per §4.10/§6.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::header::ACCEPT;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ferrumyx_common::error::{ApiError, RagError};
use ferrumyx_db::repo::chat;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::orchestrator::{self, RunCompletionGuard};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

fn wants_sse(headers: &HeaderMap) -> bool {
    headers.get(ACCEPT).and_then(|v| v.to_str().ok()).map(|v| v.contains("text/event-stream")).unwrap_or(false)
}

pub async fn ask_question(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<QuestionRequest>,
) -> Result<Response, ApiError> {
    let session = chat::get_session(&state.pool, session_id)
        .await
        .map_err(RagError::from)?
        .ok_or_else(|| RagError::NotFound(format!("session {session_id} not found")))?;

    let run = chat::create_run(&state.pool, session.id, session.pdf_id, "rag_qa", &req.question, json!({}))
        .await
        .map_err(RagError::from)?;

    if wants_sse(&headers) {
        let (tx, rx) = mpsc::channel::<String>(32);
        tokio::spawn(produce_stream(state, session, run.id, req.question, tx));
        let stream = ReceiverStream::new(rx).map(|payload| Ok::<_, Infallible>(Event::default().data(payload)));
        Ok(sse_response(stream))
    } else {
        let body = orchestrator::run_question_sync(
            &state.pool,
            &state.pipeline,
            &state.adapters,
            state.llm_client.as_ref(),
            &session,
            run.id,
            &req.question,
        )
        .await?;
        Ok(Json(body).into_response())
    }
}

fn sse_response(stream: impl Stream<Item = Result<Event, Infallible>> + Send + 'static) -> Response {
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Owns the producer side of the SSE channel: emits `start`, drains the
/// LLM token stream as `delta` events, and emits exactly one of
/// `final`/`error` followed by `end`. Runs as a detached task so the
/// handler can return the `Sse` response immediately; `RunCompletionGuard`
/// guarantees the run is finalized even if the receiver is dropped
/// (client disconnect) before this function returns.
async fn produce_stream(
    state: SharedState,
    session: ferrumyx_db::models::ChatSession,
    run_id: Uuid,
    question: String,
    tx: mpsc::Sender<String>,
) {
    let mut guard = RunCompletionGuard::new(state.pool.clone(), run_id);
    let _ = send_raw(&tx, json!({"type": "start"})).await;

    let prepared = match orchestrator::prepare(&state.pool, &state.pipeline, &state.adapters, &session, &question).await
    {
        Ok(p) => p,
        Err(e) => {
            let _ = send_raw(&tx, json!({"type": "error", "message": e.to_string()})).await;
            guard.complete_failure(&e.to_string()).await;
            let _ = send_raw(&tx, json!({"type": "end"})).await;
            return;
        }
    };
    guard.specialists_invoked = prepared.specialists_invoked.clone();

    let mut stream = match state.llm_client.stream_answer(&prepared.prompt).await {
        Ok(s) => s,
        Err(e) => {
            let _ = send_raw(&tx, json!({"type": "error", "message": e.to_string()})).await;
            guard.complete_failure(&e.to_string()).await;
            let _ = send_raw(&tx, json!({"type": "end"})).await;
            return;
        }
    };

    let mut answer = String::new();
    let mut failed = false;
    while let Some(item) = stream.next().await {
        match item {
            Ok(delta) => {
                answer.push_str(&delta);
                let _ = send_raw(&tx, json!({"type": "delta", "content": delta})).await;
            }
            Err(e) => {
                let _ = send_raw(&tx, json!({"type": "error", "message": e.to_string()})).await;
                failed = true;
                break;
            }
        }
    }

    if failed {
        guard.complete_failure("llm stream interrupted").await;
        let _ = send_raw(&tx, json!({"type": "end"})).await;
        return;
    }

    let final_payload = json!({
        "type": "final",
        "answer": answer,
        "citations": prepared.citations,
        "metadata": prepared.metadata,
        "specialist_results": prepared.specialist_results,
        "specialists_invoked": prepared.specialists_invoked,
    });
    let _ = send_raw(&tx, final_payload).await;

    if let Err(e) = chat::append_message_pair(
        &state.pool,
        session.id,
        &question,
        &answer,
        json!(prepared.citations),
        prepared.metadata.clone(),
    )
    .await
    {
        tracing::error!(session_id = %session.id, error = %e, "failed to persist message pair after successful stream");
    }

    guard.complete_success(json!({"answer": answer, "deps": prepared.deps})).await;
    let _ = send_raw(&tx, json!({"type": "end"})).await;
}

async fn send_raw(tx: &mpsc::Sender<String>, payload: serde_json::Value) -> Result<(), mpsc::error::SendError<String>> {
    tx.send(payload.to_string()).await
}
