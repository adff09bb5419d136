//! Entrypoint: load config, connect the pool, build the adapter/model
//! registries, build the router, and serve.

use std::path::PathBuf;
use std::sync::Arc;

use ferrumyx_common::config::AppConfig;
use ferrumyx_embed::registry::ModelRegistry;
use ferrumyx_embed::{BiomedBertEmbedder, EmbeddingConfig};
use ferrumyx_ingestion::adapters::ontology::OntologyAdapter;
use ferrumyx_ingestion::adapters::pdf::PdfAdapter;
use ferrumyx_ingestion::adapters::AdapterRegistry;
use ferrumyx_ingestion::pipeline::UnifiedPipeline;
use ferrumyx_ingestion::workers::job_worker::{self, JobWorkerConfig};
use ferrumyx_web::llm::ExtractiveAnswerClient;
use ferrumyx_web::state::AppState;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load(Some(&PathBuf::from("ferrumyx.toml")))?;
    let pool = ferrumyx_db::connect(&config.database_url).await?;

    let model_registry = Arc::new(ModelRegistry::from_config(&config.embedding_models)?);

    let default_model = config
        .model(&config.default_embedding_model)
        .ok_or_else(|| anyhow::anyhow!("default embedding model {} is not registered", config.default_embedding_model))?;
    let embed_client: Arc<dyn ferrumyx_embed::EmbeddingClient> = Arc::new(
        BiomedBertEmbedder::new(EmbeddingConfig::default().with_model(default_model.model_name.clone())).await?,
    );

    let pdf_adapter = Arc::new(PdfAdapter::new(
        embed_client.clone(),
        model_registry.clone(),
        PathBuf::from(&config.pdf_storage_dir),
        config.default_embedding_model.clone(),
        config.auto_embed_on_ingest,
    ));
    let ontology_adapter = Arc::new(OntologyAdapter::new(
        embed_client.clone(),
        model_registry.clone(),
        PathBuf::from(&config.ontology_storage_dir),
        config.default_embedding_model.clone(),
        config.auto_embed_on_ingest,
    ));
    let adapters = Arc::new(AdapterRegistry::new(vec![pdf_adapter, ontology_adapter]));

    // No cross-encoder is wired by default (the reranker model is an
    // external collaborator); the pipeline falls back to pre-rerank hybrid
    // ordering, per C8's documented degraded path.
    let pipeline = Arc::new(UnifiedPipeline::new(adapters.clone(), embed_client.clone(), None, Default::default()));

    let (events, _rx) = ferrumyx_web::sse::channel();

    tokio::spawn(job_worker::run(
        pool.clone(),
        embed_client.clone(),
        model_registry.clone(),
        JobWorkerConfig {
            worker_id: format!("ferrumyx-web-{}", Uuid::new_v4()),
            poll_interval: std::time::Duration::from_millis(config.job_poll_interval_ms),
            max_retries: config.job_max_retries,
        },
    ));

    let state = Arc::new(AppState {
        pool,
        config,
        pipeline,
        adapters,
        model_registry,
        embed_client,
        cross_encoder: None,
        llm_client: Arc::new(ExtractiveAnswerClient),
        events,
    });

    let app = ferrumyx_web::router::build(state.clone());

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    tracing::info!(addr = %state.config.bind_addr, "ferrumyx-web listening");
    axum::serve(listener, app).await?;

    Ok(())
}
