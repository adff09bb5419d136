//! PDF source adapter: scopes searches and ingestion by `pdf_id`.

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
use uuid::Uuid;

use super::{Citation, SourceAdapter};
use crate::workers::pdf::ingest_pdf;

pub struct PdfAdapter {
    client: Arc<dyn EmbeddingClient>,
    registry: Arc<ModelRegistry>,
    storage_dir: PathBuf,
    model_name: String,
    auto_embed: bool,
}

impl PdfAdapter {
    pub fn new(
        client: Arc<dyn EmbeddingClient>,
        registry: Arc<ModelRegistry>,
        storage_dir: PathBuf,
        model_name: String,
        auto_embed: bool,
    ) -> Self {
        Self { client, registry, storage_dir, model_name, auto_embed }
    }

    fn file_path(&self, pdf_id: &str) -> PathBuf {
        self.storage_dir.join(format!("{pdf_id}.pdf"))
    }
}

#[async_trait]
impl SourceAdapter for PdfAdapter {
    fn source_type(&self) -> &str {
        "pdf"
    }

    async fn ingest(&self, pool: &PgPool, _source_type: &str, source_id: &str) -> Result<IndexStatus> {
        let pdf_id = Uuid::parse_str(source_id)
            .map_err(|e| RagError::InvalidArgument(format!("invalid pdf id {source_id}: {e}")))?;
        let path = self.file_path(source_id);
        let summary =
            ingest_pdf(pool, self.client.as_ref(), &self.registry, pdf_id, &path, &self.model_name, self.auto_embed)
                .await?;
        summary.status.parse().map_err(RagError::Fatal)
    }

    async fn index_status(&self, pool: &PgPool, _source_type: &str, source_id: &str) -> Result<IndexStatus> {
        match ingestion_status::get(pool, "pdf", source_id).await? {
            Some(row) => row.status.parse().map_err(RagError::Fatal),
            None => Ok(IndexStatus::NotIndexed),
        }
    }

    fn format_citation(&self, metadata: &Value) -> Citation {
        let label = match serde_json::from_value::<Metadata>(metadata.clone()) {
            Ok(Metadata::PdfChunk(m)) => match &m.section_path {
                Some(s) => format!("{s}, p.{}", m.page_start),
                None => format!("p.{}", m.page_start),
            },
            _ => "PDF chunk".to_string(),
        };
        Citation { kind: "pdf".to_string(), label, fields: metadata.clone() }
    }
}
