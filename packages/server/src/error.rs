use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Core error taxonomy.
///
/// Cache failures never appear here: the cache layer logs and degrades to
/// a miss instead of aborting the request.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user configuration (cyclic field dependencies, unknown
    /// indexer, bad score expression, unsupported vector length, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Explicit reference to an item that does not exist.
    #[error("item {item_id} not found in collection {collection}")]
    ItemNotFound { item_id: String, collection: String },

    /// Query vector length does not match the collection's dimension.
    #[error("query vector has {got} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Embedding or LLM backend unreachable after the client's retries.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The LLM returned no usable tool call.
    #[error("bad LLM response: {0}")]
    LlmBadResponse(String),

    /// Request schema violation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Search index backend failure.
    #[error("index error: {0}")]
    Index(String),

    /// Database failure.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Config(_)
            | Error::ItemNotFound { .. }
            | Error::DimensionMismatch { .. }
            | Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::UpstreamUnavailable(_) | Error::LlmBadResponse(_) => StatusCode::BAD_GATEWAY,
            Error::Index(_) | Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<llm_client::LlmError> for Error {
    fn from(err: llm_client::LlmError) -> Self {
        match err {
            llm_client::LlmError::Config(msg) => Error::Config(msg),
            llm_client::LlmError::Network(msg) | llm_client::LlmError::Api(msg) => {
                Error::UpstreamUnavailable(msg)
            }
            llm_client::LlmError::Parse(msg) | llm_client::LlmError::NoToolCall(msg) => {
                Error::LlmBadResponse(msg)
            }
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Index(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::Config("bad".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::DimensionMismatch {
                expected: 1536,
                got: 384
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::UpstreamUnavailable("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_llm_error_mapping() {
        let err: Error = llm_client::LlmError::NoToolCall("nothing".into()).into();
        assert!(matches!(err, Error::LlmBadResponse(_)));

        let err: Error = llm_client::LlmError::Network("refused".into()).into();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }
}
