pub mod chat;
pub mod ingestion_status;
pub mod jobs;
pub mod ontology;
pub mod pdf;
pub mod unified_chunks;
