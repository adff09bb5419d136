//! ferrumyx-ingestion — PDF/ontology source adapters, the unified
//! pipeline facade, and the ingestion workers that populate them.

pub mod adapters;
pub mod chunker;
pub mod embedding;
pub mod fingerprint;
pub mod obo;
pub mod pdf_parser;
pub mod pipeline;
pub mod workers;

pub use adapters::{AdapterRegistry, Citation, SourceAdapter};
pub use pipeline::{ConfigOverrides, PipelineChunk, PipelineResponse, ResolvedConfig, UnifiedPipeline};
