//! C4 MMR Diversifier: greedy maximal-marginal-relevance selection over a
//! candidate set that already carries a relevance score.

use crate::types::{MmrPick, RankedCandidate};

pub fn diversify(candidates: Vec<RankedCandidate>, lambda: f64, top_k: i64) -> Vec<MmrPick> {
    if top_k <= 0 {
        return Vec::new();
    }
    let lambda = lambda.clamp(0.0, 1.0) as f32;

    let mut remaining = candidates;
    let mut picks: Vec<MmrPick> = Vec::new();

    while !remaining.is_empty() && picks.len() < top_k as usize {
        let next_index = if picks.is_empty() {
            remaining
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(i, _)| i)
                .unwrap()
        } else {
            remaining
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let max_sim = picks
                        .iter()
                        .map(|p| cosine_similarity(c.embedding.as_deref(), p.candidate.embedding.as_deref()))
                        .fold(0.0_f32, f32::max);
                    let mmr = lambda * c.score - (1.0 - lambda) * max_sim;
                    (i, mmr)
                })
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(i, _)| i)
                .unwrap()
        };

        let candidate = remaining.remove(next_index);
        let mmr_score = if picks.is_empty() {
            candidate.score
        } else {
            let max_sim = picks
                .iter()
                .map(|p| cosine_similarity(candidate.embedding.as_deref(), p.candidate.embedding.as_deref()))
                .fold(0.0_f32, f32::max);
            lambda * candidate.score - (1.0 - lambda) * max_sim
        };
        picks.push(MmrPick { candidate, mmr_score });
    }

    picks
}

fn cosine_similarity(a: Option<&[f32]>, b: Option<&[f32]>) -> f32 {
    match (a, b) {
        (Some(a), Some(b)) if a.len() == b.len() && !a.is_empty() => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                0.0
            } else {
                dot / (norm_a * norm_b)
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(id: &str, score: f32, embedding: Option<Vec<f32>>) -> RankedCandidate {
        RankedCandidate {
            chunk_id: id.to_string(),
            text: String::new(),
            score,
            retriever_score: score,
            embedding,
            metadata: json!({}),
        }
    }

    #[test]
    fn first_pick_is_highest_scoring() {
        let picks = diversify(vec![candidate("a", 0.5, None), candidate("b", 0.9, None)], 0.5, 5);
        assert_eq!(picks[0].candidate.chunk_id, "b");
        assert_eq!(picks[0].mmr_score, 0.9);
    }

    #[test]
    fn no_embeddings_reduces_to_relevance_ordering() {
        let picks = diversify(
            vec![candidate("a", 0.9, None), candidate("b", 0.5, None), candidate("c", 0.7, None)],
            0.5,
            5,
        );
        let order: Vec<&str> = picks.iter().map(|p| p.candidate.chunk_id.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[test]
    fn near_duplicate_embedding_is_penalized() {
        let picks = diversify(
            vec![
                candidate("a", 0.9, Some(vec![1.0, 0.0])),
                candidate("b", 0.85, Some(vec![1.0, 0.0])),
                candidate("c", 0.6, Some(vec![0.0, 1.0])),
            ],
            0.5,
            2,
        );
        assert_eq!(picks[0].candidate.chunk_id, "a");
        // b is nearly identical to a (cos sim 1.0); c is orthogonal and should win the second slot
        assert_eq!(picks[1].candidate.chunk_id, "c");
    }

    #[test]
    fn zero_top_k_returns_empty() {
        let picks = diversify(vec![candidate("a", 0.9, None)], 0.5, 0);
        assert!(picks.is_empty());
    }
}
