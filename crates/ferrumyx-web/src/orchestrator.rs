//! C10 Streaming Q&A Orchestrator: prepare phase (pipeline search +
//! specialist fan-out + prompt assembly) followed by either a single JSON
//! response or an SSE token stream, with run persistence guaranteed on
//! every exit path.
//!
//! Grounded in `backend/app/routers/rag_endpoints.py`'s run-before-stream
//! contract (see SPEC_FULL.md §4.10): the run record always exists before
//! generation starts, is always finalized, and the message pair is
//! persisted only once a `final` state was actually produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ferrumyx_common::error::{RagError, Result};
use ferrumyx_db::models::ChatSession;
use ferrumyx_db::repo::chat;
use ferrumyx_ingestion::pipeline::{ConfigOverrides, PipelineResponse, UnifiedPipeline};
use ferrumyx_ingestion::adapters::AdapterRegistry;
use futures_util::StreamExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::llm::LlmClient;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SpecialistSpec {
    pub name: String,
    pub source_type: String,
    pub source_id: String,
}

pub struct PreparedAnswer {
    pub prompt: String,
    pub deps: Value,
    pub citations: Vec<Value>,
    pub specialist_results: Value,
    pub specialists_invoked: Vec<String>,
    pub metadata: Value,
}

/// Routes specialists (if `rag_config.specialists` names any), runs the
/// primary PDF search, and assembles the prompt + context-block text.
/// Never mutates `chat_sessions`/`messages`/`langgraph_runs` — pure
/// read-and-assemble, consistent with the pipeline/reranker being
/// read-only (§3).
pub async fn prepare(
    pool: &PgPool,
    pipeline: &UnifiedPipeline,
    adapters: &AdapterRegistry,
    session: &ChatSession,
    question: &str,
) -> Result<PreparedAnswer> {
    let overrides: ConfigOverrides = session
        .rag_config
        .as_object()
        .map(|_| serde_json::from_value(session.rag_config.clone()).unwrap_or_default())
        .unwrap_or_default();

    let primary = pipeline
        .search(pool, "pdf", &session.pdf_id.to_string(), question, None, overrides)
        .await?;

    let pdf_adapter = adapters
        .resolve("pdf")
        .ok_or_else(|| RagError::DependencyMissing("no pdf adapter registered".into()))?;
    let citations: Vec<Value> = primary
        .chunks
        .iter()
        .map(|c| serde_json::to_value(pdf_adapter.format_citation(&c.metadata)).unwrap_or(Value::Null))
        .collect();

    let context: String = primary.chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>().join("\n\n");

    let specialists: Vec<SpecialistSpec> = session
        .rag_config
        .get("specialists")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    let mut specialist_blocks = Vec::new();
    let mut specialist_results = serde_json::Map::new();
    let mut specialists_invoked = Vec::new();

    for spec in &specialists {
        match pipeline
            .search(pool, &spec.source_type, &spec.source_id, question, Some(&context), ConfigOverrides::default())
            .await
        {
            Ok(response) => {
                specialists_invoked.push(spec.name.clone());
                specialist_blocks.push(format_specialist_block(&spec.name, &response));
                specialist_results.insert(spec.name.clone(), serde_json::to_value(&response).unwrap_or(Value::Null));
            }
            Err(e) => {
                tracing::warn!(specialist = %spec.name, error = %e, "specialist search failed, omitting from prompt");
            }
        }
    }

    let specialist_text = if specialist_blocks.is_empty() {
        String::new()
    } else {
        format!("Specialist Findings:\n{}", specialist_blocks.join("\n"))
    };

    let prompt = build_prompt(question, &context, &specialist_text);
    let deps = json!({ "context": context, "specialist_findings": specialist_text });
    let metadata = json!({ "pipeline": primary.metadata, "specialists_invoked": specialists_invoked });

    Ok(PreparedAnswer { prompt, deps, citations, specialist_results: Value::Object(specialist_results), specialists_invoked, metadata })
}

fn build_prompt(question: &str, context: &str, specialist_text: &str) -> String {
    let mut prompt = String::from("Answer using only the context below.\n\nRetrieved context:\n");
    prompt.push_str(context);
    if !specialist_text.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(specialist_text);
    }
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question);
    prompt
}

/// `[name] specialist findings:` plus up to 5 `- term_id: definition`
/// lines, per §4.10's supplemental formatting rule. No `answer` line: none
/// of the registered specialists synthesize one today.
fn format_specialist_block(name: &str, response: &PipelineResponse) -> String {
    let mut block = format!("[{name}] specialist findings:\n");
    for chunk in response.chunks.iter().take(5) {
        let term_id = chunk.metadata.get("term_id").and_then(|v| v.as_str()).unwrap_or(chunk.chunk_id.as_str());
        let definition: String = chunk.text.chars().take(160).collect();
        block.push_str(&format!("- {term_id}: {definition}\n"));
    }
    block
}

/// Drains an `LlmClient` token stream into a single `String`, used by the
/// non-streaming JSON path. A mid-stream error aborts with whatever text
/// had accumulated discarded, matching the streaming path's rule that a
/// partial answer is never surfaced without a `final` event backing it.
pub async fn collect_answer(mut stream: crate::llm::TokenStream) -> Result<String> {
    let mut answer = String::new();
    while let Some(chunk) = stream.next().await {
        answer.push_str(&chunk?);
    }
    Ok(answer)
}

/// RAII guard recording a `langgraph_runs` completion exactly once. If the
/// surrounding task is dropped (client disconnect cancels the SSE
/// producer) before `complete_success`/`complete_failure` runs, `Drop`
/// spawns a detached task that records the run as `failed` with a
/// `"cancelled"` snapshot, so a client disconnect can never leave a run
/// permanently `running`.
pub struct RunCompletionGuard {
    pool: PgPool,
    run_id: Uuid,
    started: Instant,
    completed: Arc<AtomicBool>,
    pub specialists_invoked: Vec<String>,
}

impl RunCompletionGuard {
    pub fn new(pool: PgPool, run_id: Uuid) -> Self {
        Self { pool, run_id, started: Instant::now(), completed: Arc::new(AtomicBool::new(false)), specialists_invoked: Vec::new() }
    }

    pub async fn complete_success(&mut self, state_snapshot: Value) {
        self.completed.store(true, Ordering::SeqCst);
        let latency = self.started.elapsed().as_millis() as i64;
        let specialists = json!(self.specialists_invoked);
        if let Err(e) = chat::complete_run(&self.pool, self.run_id, "succeeded", state_snapshot, specialists, latency).await {
            tracing::error!(run_id = %self.run_id, error = %e, "failed to record run success");
        }
    }

    pub async fn complete_failure(&mut self, message: &str) {
        self.completed.store(true, Ordering::SeqCst);
        let latency = self.started.elapsed().as_millis() as i64;
        if let Err(e) =
            chat::complete_run(&self.pool, self.run_id, "failed", json!({"error": message}), json!([]), latency).await
        {
            tracing::error!(run_id = %self.run_id, error = %e, "failed to record run failure");
        }
    }
}

impl Drop for RunCompletionGuard {
    fn drop(&mut self) {
        if self.completed.load(Ordering::SeqCst) {
            return;
        }
        let pool = self.pool.clone();
        let run_id = self.run_id;
        let latency = self.started.elapsed().as_millis() as i64;
        tokio::spawn(async move {
            let _ = chat::complete_run(&pool, run_id, "failed", json!({"error": "cancelled"}), json!([]), latency).await;
        });
    }
}

/// Runs the prepare phase, drains the LLM stream to completion, persists
/// the message pair, and finalizes the run — the synchronous path used by
/// non-SSE requests. Returns the same shape an SSE `final` event carries.
pub async fn run_question_sync(
    pool: &PgPool,
    pipeline: &UnifiedPipeline,
    adapters: &AdapterRegistry,
    llm_client: &dyn LlmClient,
    session: &ChatSession,
    run_id: Uuid,
    question: &str,
) -> Result<Value> {
    let mut guard = RunCompletionGuard::new(pool.clone(), run_id);

    let prepared = match prepare(pool, pipeline, adapters, session, question).await {
        Ok(p) => p,
        Err(e) => {
            guard.complete_failure(&e.to_string()).await;
            return Err(e);
        }
    };
    guard.specialists_invoked = prepared.specialists_invoked.clone();

    let stream = match llm_client.stream_answer(&prepared.prompt).await {
        Ok(s) => s,
        Err(e) => {
            guard.complete_failure(&e.to_string()).await;
            return Err(e);
        }
    };
    let answer = match collect_answer(stream).await {
        Ok(a) => a,
        Err(e) => {
            guard.complete_failure(&e.to_string()).await;
            return Err(e);
        }
    };

    if let Err(e) =
        chat::append_message_pair(pool, session.id, question, &answer, json!(prepared.citations), prepared.metadata.clone())
            .await
    {
        guard.complete_failure(&e.to_string()).await;
        return Err(RagError::from(e));
    }

    guard.complete_success(json!({"answer": answer, "deps": prepared.deps})).await;

    Ok(json!({
        "answer": answer,
        "citations": prepared.citations,
        "metadata": prepared.metadata,
        "specialist_results": prepared.specialist_results,
        "specialists_invoked": prepared.specialists_invoked,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialist_block_truncates_to_five_entries_with_definitions() {
        let response = PipelineResponse {
            chunks: (0..8)
                .map(|i| ferrumyx_ingestion::pipeline::PipelineChunk {
                    chunk_id: format!("T{i}"),
                    text: format!("definition number {i}"),
                    metadata: json!({"term_id": format!("T{i}")}),
                    rerank_score: 0.0,
                    combined_score: 0.0,
                    retriever_score: 0.0,
                    rank: i,
                })
                .collect(),
            metadata: json!({}),
        };
        let block = format_specialist_block("disease", &response);
        assert!(block.starts_with("[disease] specialist findings:\n"));
        assert_eq!(block.matches("- T").count(), 5);
    }

    #[test]
    fn prompt_includes_context_and_specialist_block_when_present() {
        let prompt = build_prompt("what drives growth?", "KRAS G12D", "Specialist Findings:\n[x] specialist findings:\n- T1: def\n");
        assert!(prompt.contains("KRAS G12D"));
        assert!(prompt.contains("Specialist Findings"));
        assert!(prompt.ends_with("Question: what drives growth?"));
    }

    #[test]
    fn prompt_omits_specialist_section_when_empty() {
        let prompt = build_prompt("q", "ctx", "");
        assert!(!prompt.contains("Specialist Findings"));
    }
}
