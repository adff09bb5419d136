//! ferrumyx-db — Postgres + pgvector persistence for the unified RAG
//! engine: chunk/term/status/session tables and the embedding job queue.

pub mod error;
pub mod models;
pub mod pool;
pub mod repo;

pub use pool::connect;
