//! C8 Unified Pipeline: the façade composing hybrid search (C3), the
//! reranker (C5), and document source adapters (C7).

use std::collections::HashMap;
use std::sync::Arc;

use ferrumyx_common::error::{RagError, Result};
use ferrumyx_db::models::IndexStatus;
use ferrumyx_embed::EmbeddingClient;
use ferrumyx_retrieval::hybrid::HybridQuery;
use ferrumyx_retrieval::reranker::{rerank, CrossEncoder, RerankRequest};
use ferrumyx_retrieval::scope::Scope;
use ferrumyx_retrieval::types::{HybridSearchResult, RankedCandidate};
use pgvector::Vector;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::adapters::AdapterRegistry;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    pub vector_top_k: Option<i64>,
    pub lexical_top_k: Option<i64>,
    pub max_results: Option<i64>,
    pub vector_weight: Option<f64>,
    pub rerank_top_k: Option<i64>,
    pub apply_mmr: Option<bool>,
    pub mmr_lambda: Option<f64>,
    pub context_boost: Option<f64>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ResolvedConfig {
    pub vector_top_k: i64,
    pub lexical_top_k: i64,
    pub max_results: i64,
    pub vector_weight: f64,
    pub rerank_top_k: i64,
    pub apply_mmr: bool,
    pub mmr_lambda: f64,
    pub context_boost: f64,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            vector_top_k: 20,
            lexical_top_k: 20,
            max_results: 20,
            vector_weight: 0.5,
            rerank_top_k: 10,
            apply_mmr: false,
            mmr_lambda: 0.5,
            context_boost: 1.0,
        }
    }
}

impl ResolvedConfig {
    fn merge(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(v) = overrides.vector_top_k {
            self.vector_top_k = v;
        }
        if let Some(v) = overrides.lexical_top_k {
            self.lexical_top_k = v;
        }
        if let Some(v) = overrides.max_results {
            self.max_results = v;
        }
        if let Some(v) = overrides.vector_weight {
            self.vector_weight = v;
        }
        if let Some(v) = overrides.rerank_top_k {
            self.rerank_top_k = v;
        }
        if let Some(v) = overrides.apply_mmr {
            self.apply_mmr = v;
        }
        if let Some(v) = overrides.mmr_lambda {
            self.mmr_lambda = v;
        }
        if let Some(v) = overrides.context_boost {
            self.context_boost = v;
        }
        self
    }

    /// The allow-listed subset surfaced in a response's metadata — never
    /// the full resolved config, so secrets/internal overrides never leak.
    fn as_public_json(&self) -> Value {
        json!({
            "vector_top_k": self.vector_top_k,
            "lexical_top_k": self.lexical_top_k,
            "max_results": self.max_results,
            "rerank_top_k": self.rerank_top_k,
            "apply_mmr": self.apply_mmr,
            "mmr_lambda": self.mmr_lambda,
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineChunk {
    pub chunk_id: String,
    pub text: String,
    pub metadata: Value,
    pub rerank_score: f32,
    pub combined_score: f32,
    pub retriever_score: f32,
    pub rank: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineResponse {
    pub chunks: Vec<PipelineChunk>,
    pub metadata: Value,
}

pub struct UnifiedPipeline {
    adapters: Arc<AdapterRegistry>,
    embed_client: Arc<dyn EmbeddingClient>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    default_config: ResolvedConfig,
    per_source_overrides: HashMap<String, ConfigOverrides>,
}

impl UnifiedPipeline {
    pub fn new(
        adapters: Arc<AdapterRegistry>,
        embed_client: Arc<dyn EmbeddingClient>,
        cross_encoder: Option<Arc<dyn CrossEncoder>>,
        per_source_overrides: HashMap<String, ConfigOverrides>,
    ) -> Self {
        Self { adapters, embed_client, cross_encoder, default_config: ResolvedConfig::default(), per_source_overrides }
    }

    fn resolve_config(&self, source_type: &str, request_overrides: &ConfigOverrides) -> ResolvedConfig {
        let mut cfg = self.default_config;
        if let Some(per_source) = self.per_source_overrides.get(source_type) {
            cfg = cfg.merge(per_source);
        }
        cfg.merge(request_overrides)
    }

    fn scope_for(&self, source_type: &str, source_id: &str) -> Result<Scope> {
        if source_type == "pdf" {
            let pdf_id = Uuid::parse_str(source_id)
                .map_err(|e| RagError::InvalidArgument(format!("invalid pdf id {source_id}: {e}")))?;
            Ok(Scope::Pdf { pdf_id, model_name: self.embed_client.model_name().to_string() })
        } else {
            Ok(Scope::Unified { source_type: source_type.to_string(), source_id: source_id.to_string() })
        }
    }

    pub async fn ensure_index_ready(&self, pool: &PgPool, source_type: &str, source_id: &str) -> Result<IndexStatus> {
        let adapter = self
            .adapters
            .resolve(source_type)
            .ok_or_else(|| RagError::InvalidArgument(format!("no adapter registered for {source_type}")))?;
        let status = adapter.index_status(pool, source_type, source_id).await?;
        if status == IndexStatus::NotIndexed {
            return adapter.ingest(pool, source_type, source_id).await;
        }
        Ok(status)
    }

    pub async fn search(
        &self,
        pool: &PgPool,
        source_type: &str,
        source_id: &str,
        query: &str,
        context: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<PipelineResponse> {
        let config = self.resolve_config(source_type, &overrides);
        let scope = self.scope_for(source_type, source_id)?;

        let query_vectors = self
            .embed_client
            .embed(&[query.to_string()])
            .await
            .map_err(|e| RagError::ProviderProtocolError(e.to_string()))?;
        let query_vector = query_vectors.into_iter().next().map(Vector::from);

        let hybrid_req = HybridQuery {
            scope: &scope,
            embedding: query_vector.as_ref(),
            text: query,
            vector_top_k: config.vector_top_k,
            lexical_top_k: config.lexical_top_k,
            max_results: config.max_results,
            vector_weight: config.vector_weight,
        };
        let (hybrid_results, metrics) = ferrumyx_retrieval::hybrid::query(pool, &hybrid_req).await?;

        let total_candidates = hybrid_results.len();
        let result_map: HashMap<String, HybridSearchResult> =
            hybrid_results.iter().cloned().map(|r| (r.chunk_id.clone(), r)).collect();

        let boosted: Vec<RankedCandidate> = hybrid_results
            .into_iter()
            .map(|r| apply_context_boost(r, context, config.context_boost))
            .collect();

        let reranked = if let Some(encoder) = &self.cross_encoder {
            let req = RerankRequest {
                query_text: query,
                candidates: boosted,
                top_k: config.rerank_top_k,
                apply_mmr: config.apply_mmr,
                mmr_lambda: config.mmr_lambda,
            };
            match rerank(Some(encoder.as_ref()), req).await {
                Ok(r) => r,
                Err(RagError::DependencyMissing(_)) => fallback_ordering(&result_map, config.rerank_top_k),
                Err(e) => return Err(e),
            }
        } else {
            fallback_ordering(&result_map, config.rerank_top_k)
        };

        let chunks: Vec<PipelineChunk> = reranked
            .into_iter()
            .map(|r| {
                let (text, metadata) = result_map
                    .get(&r.chunk_id)
                    .map(|orig| (orig.text.clone(), orig.metadata.clone()))
                    .unwrap_or((r.text, r.metadata));
                PipelineChunk {
                    chunk_id: r.chunk_id,
                    text,
                    metadata,
                    rerank_score: r.rerank_score,
                    combined_score: r.combined_score,
                    retriever_score: r.retriever_score,
                    rank: r.rank,
                }
            })
            .collect();

        let metadata = json!({
            "total_candidates": total_candidates,
            "final_results": chunks.len(),
            "metrics": metrics,
            "config": config.as_public_json(),
        });

        Ok(PipelineResponse { chunks, metadata })
    }
}

/// Clones a hybrid result into the reranker's candidate shape, boosting
/// `retriever_score` when `context_boost > 1` and any of the candidate's
/// first 10 lowercased words occurs in the lowercased context. Never
/// mutates the original `HybridSearchResult`.
fn apply_context_boost(result: HybridSearchResult, context: Option<&str>, context_boost: f64) -> RankedCandidate {
    let mut metadata = result.metadata.clone();
    let mut score = result.score;

    if context_boost > 1.0 {
        if let Some(context) = context {
            let lowered_context = context.to_lowercase();
            let leading_words: Vec<String> =
                result.text.split_whitespace().take(10).map(|w| w.to_lowercase()).collect();
            if leading_words.iter().any(|w| !w.is_empty() && lowered_context.contains(w.as_str())) {
                score = (score as f64 * context_boost) as f32;
                if let Value::Object(map) = &mut metadata {
                    map.insert("context_boost".to_string(), json!(context_boost));
                }
            }
        }
    }

    RankedCandidate {
        chunk_id: result.chunk_id,
        text: result.text,
        score,
        retriever_score: score,
        embedding: result.embedding,
        metadata,
    }
}

/// When no cross-encoder is available, fall back to the pre-rerank hybrid
/// ordering truncated at `rerank_top_k`, shaped like a reranked result so
/// downstream code doesn't need to special-case the degraded path.
fn fallback_ordering(
    result_map: &HashMap<String, HybridSearchResult>,
    rerank_top_k: i64,
) -> Vec<ferrumyx_retrieval::types::RerankedResult> {
    let mut ordered: Vec<&HybridSearchResult> = result_map.values().collect();
    ordered.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let take = if rerank_top_k > 0 { rerank_top_k as usize } else { 0 };
    ordered
        .into_iter()
        .take(take)
        .enumerate()
        .map(|(rank, r)| ferrumyx_retrieval::types::RerankedResult {
            chunk_id: r.chunk_id.clone(),
            text: r.text.clone(),
            rerank_score: r.score,
            combined_score: r.score,
            retriever_score: r.score,
            rank,
            metadata: r.metadata.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrumyx_test_utils::hybrid_result;

    #[test]
    fn context_boost_below_threshold_is_a_no_op() {
        let result = hybrid_result("a", "Kras G12D mutation drives tumor growth", 0.5);
        let boosted = apply_context_boost(result, Some("kras g12d pathway"), 1.0);
        assert_eq!(boosted.score, 0.5);
        assert_eq!(boosted.metadata, Value::Null);
    }

    #[test]
    fn context_boost_applies_when_leading_word_matches_context() {
        let result = hybrid_result("a", "kras mutation drives growth", 0.5);
        let boosted = apply_context_boost(result, Some("prior discussion mentioned kras extensively"), 2.0);
        assert!((boosted.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn context_boost_does_not_fire_without_a_match() {
        let result = hybrid_result("a", "completely unrelated passage text", 0.5);
        let boosted = apply_context_boost(result, Some("kras g12d pathway"), 2.0);
        assert_eq!(boosted.score, 0.5);
    }

    #[test]
    fn context_boost_is_skipped_when_context_is_absent() {
        let result = hybrid_result("a", "kras mutation drives growth", 0.5);
        let boosted = apply_context_boost(result, None, 2.0);
        assert_eq!(boosted.score, 0.5);
    }

    #[test]
    fn resolved_config_merge_applies_request_overrides_last() {
        let base = ResolvedConfig::default();
        let per_source = ConfigOverrides { vector_weight: Some(0.8), ..Default::default() };
        let request = ConfigOverrides { vector_weight: Some(0.2), rerank_top_k: Some(3), ..Default::default() };
        let resolved = base.merge(&per_source).merge(&request);
        assert_eq!(resolved.vector_weight, 0.2);
        assert_eq!(resolved.rerank_top_k, 3);
    }

    #[test]
    fn fallback_ordering_sorts_by_score_descending() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), hybrid_result("a", "text a", 0.2));
        map.insert("b".to_string(), hybrid_result("b", "text b", 0.9));
        let ordered = fallback_ordering(&map, 2);
        assert_eq!(ordered[0].chunk_id, "b");
        assert_eq!(ordered[0].rank, 0);
    }

    #[test]
    fn fallback_ordering_respects_zero_top_k() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), hybrid_result("a", "text a", 0.2));
        let ordered = fallback_ordering(&map, 0);
        assert!(ordered.is_empty());
    }
}
