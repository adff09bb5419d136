//! Row types mirroring the Postgres schema. Every table is a flat struct
//! decoded via `sqlx::FromRow`; JSON columns stay as `serde_json::Value`
//! until a caller needs a typed view (see `ferrumyx_common::metadata`).

use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    NotIndexed,
    Indexing,
    Ready,
    Error,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::NotIndexed => "not_indexed",
            IndexStatus::Indexing => "indexing",
            IndexStatus::Ready => "ready",
            IndexStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for IndexStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_indexed" => Ok(IndexStatus::NotIndexed),
            "indexing" => Ok(IndexStatus::Indexing),
            "ready" => Ok(IndexStatus::Ready),
            "error" => Ok(IndexStatus::Error),
            other => Err(format!("unknown index status: {other}")),
        }
    }
}

/// `unified_chunks` — the universal retrieval unit (§3 UnifiedChunk).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UnifiedChunk {
    pub id: Uuid,
    pub source_type: String,
    pub source_id: String,
    pub chunk_id: String,
    pub chunk_text: String,
    pub chunk_metadata: Value,
    #[sqlx(default)]
    pub embedding: Option<Vector>,
    pub created_at: DateTime<Utc>,
}

/// `pdf_documents`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PdfDocument {
    pub id: Uuid,
    pub title: String,
    pub embeddings_generated: bool,
    pub embedding_models: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of `PdfDocument.embedding_models`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingModelEntry {
    pub model: String,
    pub version: String,
    pub dimensions: i32,
}

/// `pdf_chunks` — ordered, page-anchored chunks of one PDF.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PdfChunk {
    pub id: Uuid,
    pub pdf_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
    pub page_start: i32,
    pub page_end: i32,
    pub section_path: Option<String>,
    pub is_table: bool,
    pub is_figure: bool,
}

/// `pdf_embeddings` — one row per `(pdf_id, chunk_id, model_name)`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PdfEmbedding {
    pub id: Uuid,
    pub pdf_id: Uuid,
    pub chunk_id: Uuid,
    pub model_name: String,
    pub model_version: String,
    pub dimensions: i32,
    pub vector: Vector,
}

/// `ontology_terms`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OntologyTerm {
    pub ontology_type: String,
    pub source_id: String,
    pub term_id: String,
    pub name: String,
    pub definition: Option<String>,
    pub synonyms: Value,
    pub xrefs: Value,
    pub term_metadata: Value,
}

/// `ontology_term_relations` — child -> parent adjacency list.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OntologyTermRelation {
    pub ontology_type: String,
    pub source_id: String,
    pub child_term_id: String,
    pub parent_term_id: String,
    pub relation_type: String,
}

/// `ingestion_status` — one row per `(source_type, source_id)`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IngestionStatusRow {
    pub source_type: String,
    pub source_id: String,
    pub status: String,
    pub message: Value,
    pub updated_at: DateTime<Utc>,
}

/// `chat_sessions`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub pdf_id: Uuid,
    pub session_name: String,
    pub total_messages: i32,
    pub rag_config: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    UserQuestion,
    AiResponse,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::UserQuestion => "user_question",
            MessageType::AiResponse => "ai_response",
        }
    }
}

/// `messages` — append-only per session.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub message_type: String,
    pub content: String,
    pub citations: Option<Value>,
    pub retrieval_stats: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

/// `langgraph_runs` — per-question execution telemetry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LangGraphRun {
    pub id: Uuid,
    pub session_id: Uuid,
    pub pdf_id: Uuid,
    pub workflow_name: String,
    pub question: String,
    pub run_metadata: Value,
    pub state_snapshot: Value,
    pub specialists_invoked: Value,
    pub latency_ms: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

/// `embedding_jobs` — the background embedding queue. `pdf_id` is set for
/// `job_type = "pdf_embed"`; `source_type`/`source_id` are set for
/// `job_type = "unified_embed"` — exactly one of the two pairs is
/// populated per row, mirroring which adapter the job dispatches to.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmbeddingJob {
    pub id: Uuid,
    pub pdf_id: Option<Uuid>,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub job_type: String,
    pub model_name: String,
    pub batch_size: Option<i32>,
    pub force: bool,
    pub status: String,
    pub priority: i32,
    pub retry_count: i32,
    pub worker_id: Option<String>,
    pub progress: f32,
    pub error_log: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
