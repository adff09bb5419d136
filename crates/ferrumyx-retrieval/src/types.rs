//! Shared candidate/result shapes threaded through C1 → C5.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single vector-index hit: the raw distance under the configured metric
/// (cosine by default), smaller is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorCandidate {
    pub chunk_id: String,
    pub distance: f32,
}

/// A single full-text hit. `rank` is always non-negative; callers clamp a
/// missing/null Postgres rank to `0.0` before constructing this.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalCandidate {
    pub chunk_id: String,
    pub snippet: String,
    pub rank: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Vector,
    Lexical,
    Both,
}

/// C3's merged output row, after hydration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSearchResult {
    pub chunk_id: String,
    pub text: String,
    pub metadata: Value,
    pub score: f32,
    pub source: CandidateSource,
    pub vector_distance: Option<f32>,
    pub lexical_rank: Option<f32>,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HybridMetrics {
    pub vector_candidates: usize,
    pub lexical_candidates: usize,
    pub overlap_count: usize,
    pub final_count: usize,
}

/// One retrieval-result lookup keyed by chunk id, preserved alongside the
/// (possibly boosted) reranker candidate list so C8 can recover pre-boost
/// text/metadata after scoring against the boosted copy.
pub type HybridResultMap = HashMap<String, HybridSearchResult>;

/// What C4/C5 need from a candidate: a score to maximize and an optional
/// embedding to measure diversity against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub chunk_id: String,
    pub text: String,
    pub score: f32,
    pub retriever_score: f32,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Value,
}

/// A candidate selected by MMR, carrying the score that drove its pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmrPick {
    pub candidate: RankedCandidate,
    pub mmr_score: f32,
}

/// C5's final reranked item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankedResult {
    pub chunk_id: String,
    pub text: String,
    pub rerank_score: f32,
    pub combined_score: f32,
    pub retriever_score: f32,
    pub rank: usize,
    pub metadata: Value,
}
