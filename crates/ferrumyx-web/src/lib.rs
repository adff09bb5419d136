//! Axum HTTP surface for the unified RAG engine: session/question
//! endpoints (C10), ontology ingestion endpoints (C7/C9), and an ambient
//! SSE event feed.

pub mod handlers;
pub mod llm;
pub mod orchestrator;
pub mod router;
pub mod sse;
pub mod state;

pub use router::build;
pub use state::{AppState, SharedState};
