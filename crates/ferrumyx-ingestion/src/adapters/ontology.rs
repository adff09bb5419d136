//! Ontology source adapter: scopes searches and ingestion by
//! `(source_type="ontology_<kind>", source_id)`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use ferrumyx_common::error::{RagError, Result};
use ferrumyx_common::metadata::Metadata;
use ferrumyx_db::models::IndexStatus;
use ferrumyx_db::repo::ingestion_status;
use ferrumyx_embed::{EmbeddingClient, ModelRegistry};
use serde_json::Value;
use sqlx::PgPool;

use super::{Citation, SourceAdapter};
use crate::workers::ontology::ingest_ontology;

pub struct OntologyAdapter {
    client: Arc<dyn EmbeddingClient>,
    registry: Arc<ModelRegistry>,
    storage_dir: PathBuf,
    model_name: String,
    auto_embed: bool,
}

impl OntologyAdapter {
    pub fn new(
        client: Arc<dyn EmbeddingClient>,
        registry: Arc<ModelRegistry>,
        storage_dir: PathBuf,
        model_name: String,
        auto_embed: bool,
    ) -> Self {
        Self { client, registry, storage_dir, model_name, auto_embed }
    }

    fn file_path(&self, ontology_type: &str, source_id: &str) -> PathBuf {
        self.storage_dir.join(ontology_type).join(format!("{source_id}.obo"))
    }
}

/// Recovers the bare ontology kind from a full `source_type` such as
/// `"ontology_disease"`.
fn ontology_kind(source_type: &str) -> Result<&str> {
    source_type
        .strip_prefix("ontology_")
        .filter(|k| !k.is_empty())
        .ok_or_else(|| RagError::InvalidArgument(format!("not an ontology source type: {source_type}")))
}

#[async_trait]
impl SourceAdapter for OntologyAdapter {
    fn source_type(&self) -> &str {
        "ontology"
    }

    async fn ingest(&self, pool: &PgPool, source_type: &str, source_id: &str) -> Result<IndexStatus> {
        let ontology_type = ontology_kind(source_type)?;
        let path = self.file_path(ontology_type, source_id);
        let summary = ingest_ontology(
            pool,
            self.client.as_ref(),
            &self.registry,
            ontology_type,
            source_id,
            &path,
            &self.model_name,
            self.auto_embed,
        )
        .await?;
        summary.status.parse().map_err(RagError::Fatal)
    }

    async fn index_status(&self, pool: &PgPool, source_type: &str, source_id: &str) -> Result<IndexStatus> {
        ontology_kind(source_type)?;
        match ingestion_status::get(pool, source_type, source_id).await? {
            Some(row) => row.status.parse().map_err(RagError::Fatal),
            None => Ok(IndexStatus::NotIndexed),
        }
    }

    fn format_citation(&self, metadata: &Value) -> Citation {
        let label = match serde_json::from_value::<Metadata>(metadata.clone()) {
            Ok(Metadata::OntologyTerm(m)) => format!("{} ({})", m.name, m.term_id),
            _ => "ontology term".to_string(),
        };
        Citation { kind: "ontology_term".to_string(), label, fields: metadata.clone() }
    }
}
