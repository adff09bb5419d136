//! C7 Document Source Adapters: one plug-in per source type, registered
//! into a process-global, append-only registry at startup.

pub mod ontology;
pub mod pdf;
pub mod registry;

use async_trait::async_trait;
use ferrumyx_common::error::Result;
use ferrumyx_db::models::IndexStatus;
use serde_json::Value;
use sqlx::PgPool;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Citation {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub fields: Value,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The `source_type` this adapter owns (e.g. `"pdf"`, `"ontology_disease"`
    /// for a fixed-kind adapter, or a prefix matched by the registry for a
    /// parametrized one).
    fn source_type(&self) -> &str;

    async fn ingest(&self, pool: &PgPool, source_type: &str, source_id: &str) -> Result<IndexStatus>;

    async fn index_status(&self, pool: &PgPool, source_type: &str, source_id: &str) -> Result<IndexStatus>;

    fn format_citation(&self, metadata: &Value) -> Citation;
}

pub use registry::AdapterRegistry;
