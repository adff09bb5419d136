//! Shared application state: the pool, the two process-global registries'
//! owning `Arc`s, the configured embedding/LLM clients, and the ambient
//! event broadcaster. Built once in `main` and cloned (cheaply, via `Arc`)
//! into every handler.

use std::sync::Arc;

use ferrumyx_common::config::AppConfig;
use ferrumyx_embed::{EmbeddingClient, ModelRegistry};
use ferrumyx_ingestion::AdapterRegistry;
use ferrumyx_ingestion::pipeline::UnifiedPipeline;
use ferrumyx_retrieval::reranker::CrossEncoder;
use sqlx::PgPool;

use crate::llm::LlmClient;
use crate::sse::EventSender;

pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub pipeline: Arc<UnifiedPipeline>,
    pub adapters: Arc<AdapterRegistry>,
    pub model_registry: Arc<ModelRegistry>,
    pub embed_client: Arc<dyn EmbeddingClient>,
    pub cross_encoder: Option<Arc<dyn CrossEncoder>>,
    pub llm_client: Arc<dyn LlmClient>,
    pub events: EventSender,
}

pub type SharedState = Arc<AppState>;
