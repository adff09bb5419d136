//! The narrow interface the rest of the workspace programs against, so
//! tests can inject a fake embedder instead of loading a real model.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a batch of texts. The returned vector count must exactly
    /// match `texts.len()`; callers treat a mismatch as a
    /// `ProviderProtocolError`.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

#[async_trait]
impl EmbeddingClient for crate::embedder::BiomedBertEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension()
    }

    fn model_name(&self) -> &str {
        self.model_name()
    }
}
