//! C3 Hybrid Search: the precise nine-step weighted-normalization merge of
//! vector and lexical candidates. Not reciprocal-rank-fusion.

use std::collections::{HashMap, HashSet};

use ferrumyx_common::error::Result;
use pgvector::Vector;
use sqlx::PgPool;

use crate::scope::Scope;
use crate::types::{CandidateSource, HybridMetrics, HybridSearchResult, LexicalCandidate, VectorCandidate};

pub struct HybridQuery<'a> {
    pub scope: &'a Scope,
    pub embedding: Option<&'a Vector>,
    pub text: &'a str,
    pub vector_top_k: i64,
    pub lexical_top_k: i64,
    pub max_results: i64,
    pub vector_weight: f64,
}

pub async fn query(pool: &PgPool, q: &HybridQuery<'_>) -> Result<(Vec<HybridSearchResult>, HybridMetrics)> {
    let vector_candidates = match q.embedding {
        Some(v) if q.vector_top_k > 0 => q.scope.vector_search(pool, v, q.vector_top_k).await?,
        _ => Vec::new(),
    };
    let lexical_candidates = if q.lexical_top_k > 0 {
        q.scope.lexical_search(pool, q.text, q.lexical_top_k).await?
    } else {
        Vec::new()
    };

    let merged = merge(&vector_candidates, &lexical_candidates, q.vector_weight, q.max_results);

    let chunk_ids: Vec<String> = merged.iter().map(|m| m.chunk_id.clone()).collect();
    let hydrated = q.scope.hydrate(pool, &chunk_ids).await?;
    let hydrated_by_id: HashMap<String, _> = hydrated.into_iter().map(|h| (h.chunk_id.clone(), h)).collect();

    let vector_count = vector_candidates.len();
    let lexical_count = lexical_candidates.len();
    let vector_ids: HashSet<&str> = vector_candidates.iter().map(|c| c.chunk_id.as_str()).collect();
    let lexical_ids: HashSet<&str> = lexical_candidates.iter().map(|c| c.chunk_id.as_str()).collect();
    let overlap_count = vector_ids.intersection(&lexical_ids).count();

    let mut results = Vec::with_capacity(merged.len());
    for m in merged {
        let (text, metadata, embedding) = match hydrated_by_id.get(&m.chunk_id) {
            Some(h) => (h.text.clone(), h.metadata.clone(), h.embedding.clone()),
            None => (String::new(), serde_json::Value::Null, None),
        };
        results.push(HybridSearchResult {
            chunk_id: m.chunk_id,
            text,
            metadata,
            score: m.combined,
            source: m.source,
            vector_distance: m.vector_distance,
            lexical_rank: m.lexical_rank,
            embedding,
        });
    }

    let metrics = HybridMetrics {
        vector_candidates: vector_count,
        lexical_candidates: lexical_count,
        overlap_count,
        final_count: results.len(),
    };
    Ok((results, metrics))
}

struct MergedCandidate {
    chunk_id: String,
    combined: f32,
    source: CandidateSource,
    vector_distance: Option<f32>,
    lexical_rank: Option<f32>,
}

/// The nine-step merge, pure and scope-agnostic so it can be unit tested
/// without a database.
fn merge(
    vector_candidates: &[VectorCandidate],
    lexical_candidates: &[LexicalCandidate],
    vector_weight: f64,
    max_results: i64,
) -> Vec<MergedCandidate> {
    let w = vector_weight.clamp(0.0, 1.0);

    let vector_scores: HashMap<&str, f32> = vector_candidates
        .iter()
        .map(|c| (c.chunk_id.as_str(), 1.0 / (1.0 + c.distance)))
        .collect();
    let lexical_scores: HashMap<&str, f32> =
        lexical_candidates.iter().map(|c| (c.chunk_id.as_str(), c.rank.max(0.0))).collect();

    let max_v = vector_scores.values().cloned().fold(0.0_f32, f32::max);
    let max_l = lexical_scores.values().cloned().fold(0.0_f32, f32::max);

    let w_v = if vector_candidates.is_empty() { 0.0 } else { w };
    let w_l = if lexical_candidates.is_empty() { 0.0 } else { 1.0 - w };
    let total_w = if w_v + w_l == 0.0 { 1.0 } else { w_v + w_l };

    let mut order: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for c in vector_candidates {
        if seen.insert(c.chunk_id.as_str()) {
            order.push(c.chunk_id.as_str());
        }
    }
    for c in lexical_candidates {
        if seen.insert(c.chunk_id.as_str()) {
            order.push(c.chunk_id.as_str());
        }
    }

    let mut merged: Vec<MergedCandidate> = order
        .into_iter()
        .map(|chunk_id| {
            let vector_distance = vector_candidates.iter().find(|c| c.chunk_id == chunk_id).map(|c| c.distance);
            let lexical_rank = lexical_candidates.iter().find(|c| c.chunk_id == chunk_id).map(|c| c.rank.max(0.0));

            let v_score = vector_scores.get(chunk_id).copied();
            let l_score = lexical_scores.get(chunk_id).copied();

            let v_term = match v_score {
                Some(s) if max_v > 0.0 => (w_v as f32) * (s / max_v),
                _ => 0.0,
            };
            let l_term = match l_score {
                Some(s) if max_l > 0.0 => (w_l as f32) * (s / max_l),
                _ => 0.0,
            };
            let combined = (v_term + l_term) / (total_w as f32);

            let source = match (v_score.is_some(), l_score.is_some()) {
                (true, true) => CandidateSource::Both,
                (true, false) => CandidateSource::Vector,
                (false, true) => CandidateSource::Lexical,
                (false, false) => unreachable!("chunk_id came from one of the two candidate lists"),
            };

            MergedCandidate {
                chunk_id: chunk_id.to_string(),
                combined,
                source,
                vector_distance,
                lexical_rank,
            }
        })
        .collect();

    merged.sort_by(|a, b| {
        b.combined
            .partial_cmp(&a.combined)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.lexical_rank
                    .unwrap_or(0.0)
                    .partial_cmp(&a.lexical_rank.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                let a_dist = a.vector_distance.unwrap_or(f32::MAX);
                let b_dist = b.vector_distance.unwrap_or(f32::MAX);
                a_dist.partial_cmp(&b_dist).unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    if max_results > 0 {
        merged.truncate(max_results as usize);
    } else {
        merged.clear();
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(id: &str, distance: f32) -> VectorCandidate {
        VectorCandidate { chunk_id: id.to_string(), distance }
    }
    fn l(id: &str, rank: f32) -> LexicalCandidate {
        LexicalCandidate { chunk_id: id.to_string(), snippet: String::new(), rank }
    }

    #[test]
    fn both_sides_empty_yields_no_candidates() {
        let merged = merge(&[], &[], 0.5, 10);
        assert!(merged.is_empty());
    }

    #[test]
    fn vector_only_falls_back_to_pure_vector_weight() {
        let merged = merge(&[v("a", 0.0), v("b", 1.0)], &[], 0.3, 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].chunk_id, "a");
        assert!(matches!(merged[0].source, CandidateSource::Vector));
    }

    #[test]
    fn overlap_marks_both_and_combines_normalized_scores() {
        let merged = merge(&[v("a", 0.0), v("b", 1.0)], &[l("a", 2.0), l("c", 1.0)], 0.5, 10);
        let a = merged.iter().find(|m| m.chunk_id == "a").unwrap();
        assert!(matches!(a.source, CandidateSource::Both));
        // a is vector-best (score 1.0, normalized 1.0) and lexical-best (rank 2.0, normalized 1.0)
        assert!((a.combined - 1.0).abs() < 1e-6);
    }

    #[test]
    fn max_results_truncates_after_sort() {
        let merged = merge(&[v("a", 0.0), v("b", 0.1), v("c", 0.2)], &[], 1.0, 2);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].chunk_id, "a");
        assert_eq!(merged[1].chunk_id, "b");
    }

    #[test]
    fn zero_max_results_yields_empty() {
        let merged = merge(&[v("a", 0.0)], &[], 1.0, 0);
        assert!(merged.is_empty());
    }
}
