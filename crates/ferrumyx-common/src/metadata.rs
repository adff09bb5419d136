//! Tagged metadata variant for heterogeneous chunk sources.
//!
//! Chunk metadata differs by source: PDF chunks carry page ranges and
//! section paths, ontology terms carry term identifiers and relation
//! context. Adapters translate their native shape into this variant at
//! ingestion time so downstream retrieval code never has to know which
//! source produced a chunk.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metadata {
    PdfChunk(PdfChunkMeta),
    OntologyTerm(OntologyTermMeta),
    Raw(serde_json::Map<String, Value>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfChunkMeta {
    pub chunk_index: i32,
    pub page_start: i32,
    pub page_end: i32,
    pub section_path: Option<String>,
    pub is_table: bool,
    pub is_figure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyTermMeta {
    pub ontology_type: String,
    pub term_id: String,
    pub name: String,
    pub synonyms: Vec<String>,
    pub xrefs: Vec<String>,
}

impl Metadata {
    /// Best-effort access for the MMR/context-boost path, which only cares
    /// about an opaque JSON view regardless of variant.
    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
