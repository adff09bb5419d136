//! C5 Reranker: cross-encoder pair scoring with an optional MMR pass.

use async_trait::async_trait;
use ferrumyx_common::error::{RagError, Result};

use crate::mmr;
use crate::types::{RankedCandidate, RerankedResult};

/// The narrow interface the rest of the workspace programs against, so
/// tests can inject a fake scorer instead of loading a real model.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Score each `(query_text, candidate_text)` pair; one score per input
    /// candidate, in the same order.
    async fn score_pairs(&self, query_text: &str, candidate_texts: &[String]) -> Result<Vec<f32>>;
}

pub struct RerankRequest<'a> {
    pub query_text: &'a str,
    pub candidates: Vec<RankedCandidate>,
    pub top_k: i64,
    pub apply_mmr: bool,
    pub mmr_lambda: f64,
}

pub async fn rerank(encoder: Option<&dyn CrossEncoder>, req: RerankRequest<'_>) -> Result<Vec<RerankedResult>> {
    let Some(encoder) = encoder else {
        return Err(RagError::DependencyMissing("no cross-encoder configured".into()));
    };
    if req.candidates.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = req.candidates.iter().map(|c| c.text.clone()).collect();
    let scores = encoder.score_pairs(req.query_text, &texts).await?;
    if scores.len() != req.candidates.len() {
        return Err(RagError::ProviderProtocolError(format!(
            "cross-encoder returned {} scores for {} candidates",
            scores.len(),
            req.candidates.len()
        )));
    }

    let scored: Vec<RankedCandidate> = req
        .candidates
        .into_iter()
        .zip(scores.iter())
        .map(|(mut c, &rerank_score)| {
            c.retriever_score = c.score;
            c.score = rerank_score;
            c
        })
        .collect();

    let reranked = if req.apply_mmr {
        let picks = mmr::diversify(scored, req.mmr_lambda, req.top_k);
        picks
            .into_iter()
            .enumerate()
            .map(|(rank, pick)| RerankedResult {
                chunk_id: pick.candidate.chunk_id,
                text: pick.candidate.text,
                rerank_score: pick.candidate.score,
                combined_score: pick.mmr_score,
                retriever_score: pick.candidate.retriever_score,
                rank,
                metadata: pick.candidate.metadata,
            })
            .collect()
    } else {
        let mut sorted = scored;
        sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let take = if req.top_k > 0 { req.top_k as usize } else { 0 };
        sorted
            .into_iter()
            .take(take)
            .enumerate()
            .map(|(rank, c)| RerankedResult {
                chunk_id: c.chunk_id,
                text: c.text,
                rerank_score: c.score,
                combined_score: c.score,
                retriever_score: c.retriever_score,
                rank,
                metadata: c.metadata,
            })
            .collect()
    };

    Ok(reranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FakeEncoder(Vec<f32>);

    #[async_trait]
    impl CrossEncoder for FakeEncoder {
        async fn score_pairs(&self, _query_text: &str, candidate_texts: &[String]) -> Result<Vec<f32>> {
            assert_eq!(candidate_texts.len(), self.0.len());
            Ok(self.0.clone())
        }
    }

    fn candidate(id: &str) -> RankedCandidate {
        RankedCandidate {
            chunk_id: id.to_string(),
            text: id.to_string(),
            score: 0.1,
            retriever_score: 0.1,
            embedding: None,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn missing_encoder_fails_with_dependency_missing() {
        let req = RerankRequest {
            query_text: "q",
            candidates: vec![candidate("a")],
            top_k: 1,
            apply_mmr: false,
            mmr_lambda: 0.5,
        };
        let result = rerank(None, req).await;
        assert!(matches!(result, Err(RagError::DependencyMissing(_))));
    }

    #[tokio::test]
    async fn sorts_by_score_without_mmr() {
        let encoder = FakeEncoder(vec![0.2, 0.9]);
        let req = RerankRequest {
            query_text: "q",
            candidates: vec![candidate("a"), candidate("b")],
            top_k: 2,
            apply_mmr: false,
            mmr_lambda: 0.5,
        };
        let out = rerank(Some(&encoder), req).await.unwrap();
        assert_eq!(out[0].chunk_id, "b");
        assert_eq!(out[0].rank, 0);
        assert_eq!(out[0].combined_score, out[0].rerank_score);
    }

    #[tokio::test]
    async fn score_count_mismatch_fails_as_provider_protocol_error() {
        struct BadEncoder;
        #[async_trait]
        impl CrossEncoder for BadEncoder {
            async fn score_pairs(&self, _q: &str, _t: &[String]) -> Result<Vec<f32>> {
                Ok(vec![0.5])
            }
        }
        let req = RerankRequest {
            query_text: "q",
            candidates: vec![candidate("a"), candidate("b")],
            top_k: 2,
            apply_mmr: false,
            mmr_lambda: 0.5,
        };
        let result = rerank(Some(&BadEncoder), req).await;
        assert!(matches!(result, Err(RagError::ProviderProtocolError(_))));
    }
}
