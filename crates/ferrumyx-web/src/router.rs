//! Route table: the six REST endpoints from §6 plus the ambient events
//! feed, with CORS and request tracing layered on top.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{events, ontology, question, sessions};
use crate::state::SharedState;

pub fn build(state: SharedState) -> Router {
    Router::new()
        .route("/api/rag/sessions", post(sessions::create_session))
        .route("/api/rag/sessions/{id}/question", post(question::ask_question))
        .route("/api/ontology/ingestions", get(ontology::list_ingestions).post(ontology::trigger_ingestion))
        .route("/api/ontology/ingestions/{type}/{source_id}", get(ontology::get_ingestion))
        .route("/api/ontology/ingestions/{type}/{source_id}/embeddings", post(ontology::trigger_embeddings))
        .route("/api/events", get(events::events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
