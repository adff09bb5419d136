//! Error taxonomy shared by every crate in the workspace.
//!
//! `RagError` is the library-level error every fallible retrieval,
//! ingestion, and embedding operation returns. `ApiError` wraps it at the
//! HTTP boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// The seven-member error taxonomy from the retrieval/ingestion design.
#[derive(Debug, Error)]
pub enum RagError {
    /// Caller violated a precondition: empty vector, non-positive batch
    /// size, unknown model name, malformed request body.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Scope, session, or row absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent ingestion detected on the same `(source_type, source_id)`.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A required model or external index is unavailable.
    #[error("dependency missing: {0}")]
    DependencyMissing(String),

    /// An external embedding/LLM/reranker provider returned malformed data.
    #[error("provider protocol error: {0}")]
    ProviderProtocolError(String),

    /// Network or timeout failure; safe to retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// An invariant was violated; not retriable.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl RagError {
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::InvalidArgument(_) => "invalid_argument",
            RagError::NotFound(_) => "not_found",
            RagError::Conflict(_) => "conflict",
            RagError::DependencyMissing(_) => "dependency_missing",
            RagError::ProviderProtocolError(_) => "provider_protocol_error",
            RagError::Transient(_) => "transient",
            RagError::Fatal(_) => "fatal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            RagError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RagError::NotFound(_) => StatusCode::NOT_FOUND,
            RagError::Conflict(_) => StatusCode::CONFLICT,
            RagError::DependencyMissing(_)
            | RagError::ProviderProtocolError(_)
            | RagError::Transient(_)
            | RagError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `sqlx::Error::RowNotFound` maps to `NotFound`; pool/IO-level errors are
/// `Transient` (retriable), everything else (constraint violations, decode
/// failures) is `Fatal`.
impl From<sqlx::Error> for RagError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RagError::NotFound("row not found".into()),
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                RagError::Transient(e.to_string())
            }
            other => RagError::Fatal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RagError {
    fn from(e: serde_json::Error) -> Self {
        RagError::ProviderProtocolError(format!("malformed JSON payload: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

/// HTTP-boundary wrapper. Implements `IntoResponse` so handlers can use the
/// standard `?` propagation and still produce `{"error": {kind, message}}`.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub RagError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let body = Json(json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}
