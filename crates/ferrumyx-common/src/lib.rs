//! ferrumyx-common — shared error taxonomy, chunk metadata variant, and
//! layered configuration used across the retrieval/ingestion/web crates.

pub mod config;
pub mod error;
pub mod metadata;

pub use config::AppConfig;
pub use error::{ApiError, RagError, Result};
pub use metadata::{Metadata, OntologyTermMeta, PdfChunkMeta};
