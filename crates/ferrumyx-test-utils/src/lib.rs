//! Shared fixtures for the retrieval/ingestion/web test suites: fake
//! embedder, fake cross-encoder, and small builders for the candidate
//! types C1–C5 operate on, so tests never need a real model or database.

use async_trait::async_trait;
use serde_json::{json, Value};

/// A deterministic embedder: hashes each text into a fixed-dimension
/// vector so the same input always embeds to the same output, without
/// loading any model.
pub struct FakeEmbeddingClient {
    pub dimension: usize,
    pub model_name: String,
}

impl FakeEmbeddingClient {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, model_name: "fake-embedder".to_string() }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dimension] += byte as f32 / 255.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl ferrumyx_embed::EmbeddingClient for FakeEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> ferrumyx_embed::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// A cross-encoder stand-in that scores a pair by lexical overlap between
/// the query and candidate text, so reranker tests can assert ordering
/// without a real model.
pub struct FakeCrossEncoder;

#[async_trait]
impl ferrumyx_retrieval::reranker::CrossEncoder for FakeCrossEncoder {
    async fn score_pairs(
        &self,
        query_text: &str,
        candidate_texts: &[String],
    ) -> ferrumyx_common::error::Result<Vec<f32>> {
        let query_words: std::collections::HashSet<&str> = query_text.split_whitespace().collect();
        Ok(candidate_texts
            .iter()
            .map(|text| {
                let overlap = text.split_whitespace().filter(|w| query_words.contains(w)).count();
                overlap as f32
            })
            .collect())
    }
}

/// A cross-encoder that always fails, for exercising the
/// `DependencyMissing` / fallback-ordering path without a `None` encoder.
pub struct FailingCrossEncoder;

#[async_trait]
impl ferrumyx_retrieval::reranker::CrossEncoder for FailingCrossEncoder {
    async fn score_pairs(
        &self,
        _query_text: &str,
        _candidate_texts: &[String],
    ) -> ferrumyx_common::error::Result<Vec<f32>> {
        Err(ferrumyx_common::error::RagError::ProviderProtocolError("fake cross-encoder unavailable".into()))
    }
}

pub fn ranked_candidate(chunk_id: &str, score: f32, embedding: Option<Vec<f32>>) -> ferrumyx_retrieval::types::RankedCandidate {
    ferrumyx_retrieval::types::RankedCandidate {
        chunk_id: chunk_id.to_string(),
        text: format!("text for {chunk_id}"),
        score,
        retriever_score: score,
        embedding,
        metadata: json!({}),
    }
}

pub fn hybrid_result(chunk_id: &str, text: &str, score: f32) -> ferrumyx_retrieval::types::HybridSearchResult {
    ferrumyx_retrieval::types::HybridSearchResult {
        chunk_id: chunk_id.to_string(),
        text: text.to_string(),
        metadata: Value::Null,
        score,
        source: ferrumyx_retrieval::types::CandidateSource::Vector,
        vector_distance: Some(1.0 - score),
        lexical_rank: None,
        embedding: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_embedder_is_deterministic() {
        use ferrumyx_embed::EmbeddingClient;
        let client = FakeEmbeddingClient::new(8);
        let a = client.embed(&["alpha beta".to_string()]).await.unwrap();
        let b = client.embed(&["alpha beta".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn fake_cross_encoder_rewards_overlap() {
        use ferrumyx_retrieval::reranker::CrossEncoder;
        let encoder = FakeCrossEncoder;
        let scores = encoder
            .score_pairs("kras mutation", &["kras mutation in pancreatic cancer".to_string(), "unrelated text".to_string()])
            .await
            .unwrap();
        assert!(scores[0] > scores[1]);
    }
}
