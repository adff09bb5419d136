//! `chat_sessions`, `messages`, `langgraph_runs` — the orchestrator's
//! write path. Only the orchestrator writes these tables.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ChatSession, LangGraphRun, Message};

pub async fn create_session(
    pool: &PgPool,
    pdf_id: Uuid,
    session_name: &str,
    rag_config: Value,
) -> Result<ChatSession, sqlx::Error> {
    sqlx::query_as::<_, ChatSession>(
        "INSERT INTO chat_sessions (id, pdf_id, session_name, total_messages, rag_config, created_at)
         VALUES ($1, $2, $3, 0, $4, now())
         RETURNING id, pdf_id, session_name, total_messages, rag_config, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(pdf_id)
    .bind(session_name)
    .bind(rag_config)
    .fetch_one(pool)
    .await
}

pub async fn get_session(pool: &PgPool, id: Uuid) -> Result<Option<ChatSession>, sqlx::Error> {
    sqlx::query_as::<_, ChatSession>(
        "SELECT id, pdf_id, session_name, total_messages, rag_config, created_at
         FROM chat_sessions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn create_run(
    pool: &PgPool,
    session_id: Uuid,
    pdf_id: Uuid,
    workflow_name: &str,
    question: &str,
    run_metadata: Value,
) -> Result<LangGraphRun, sqlx::Error> {
    sqlx::query_as::<_, LangGraphRun>(
        "INSERT INTO langgraph_runs
            (id, session_id, pdf_id, workflow_name, question, run_metadata, state_snapshot, specialists_invoked, latency_ms, status, created_at, completed_at)
         VALUES ($1, $2, $3, $4, $5, $6, '{}'::jsonb, '[]'::jsonb, NULL, 'running', now(), NULL)
         RETURNING id, session_id, pdf_id, workflow_name, question, run_metadata, state_snapshot, specialists_invoked, latency_ms, status, created_at, completed_at",
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(pdf_id)
    .bind(workflow_name)
    .bind(question)
    .bind(run_metadata)
    .fetch_one(pool)
    .await
}

/// Finalize a run, success or failure, exactly once. `status` is
/// `"succeeded"` or `"failed"`.
pub async fn complete_run(
    pool: &PgPool,
    run_id: Uuid,
    status: &str,
    state_snapshot: Value,
    specialists_invoked: Value,
    latency_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE langgraph_runs
         SET status = $1, state_snapshot = $2, specialists_invoked = $3, latency_ms = $4, completed_at = now()
         WHERE id = $5",
    )
    .bind(status)
    .bind(state_snapshot)
    .bind(specialists_invoked)
    .bind(latency_ms)
    .bind(run_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Append the user question + AI response pair and bump
/// `session.total_messages` by exactly 2, in one transaction.
pub async fn append_message_pair(
    pool: &PgPool,
    session_id: Uuid,
    question: &str,
    answer: &str,
    citations: Value,
    retrieval_stats: Value,
) -> Result<(Message, Message), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    let user_msg = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (id, session_id, message_type, content, citations, retrieval_stats, created_at)
         VALUES ($1, $2, 'user_question', $3, NULL, NULL, $4)
         RETURNING id, session_id, message_type, content, citations, retrieval_stats, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(question)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let ai_msg = sqlx::query_as::<_, Message>(
        "INSERT INTO messages (id, session_id, message_type, content, citations, retrieval_stats, created_at)
         VALUES ($1, $2, 'ai_response', $3, $4, $5, $6)
         RETURNING id, session_id, message_type, content, citations, retrieval_stats, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(answer)
    .bind(citations)
    .bind(retrieval_stats)
    .bind(now + chrono::Duration::milliseconds(1))
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE chat_sessions SET total_messages = total_messages + 2 WHERE id = $1")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok((user_msg, ai_msg))
}
