//! ferrumyx-retrieval — hybrid vector + lexical search (C1–C3), MMR
//! diversification (C4) and cross-encoder reranking (C5).

pub mod hybrid;
pub mod mmr;
pub mod reranker;
pub mod scope;
pub mod types;

pub use hybrid::{query as hybrid_query, HybridQuery};
pub use reranker::{rerank, CrossEncoder, RerankRequest};
pub use scope::Scope;
