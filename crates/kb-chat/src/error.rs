//! Error types for the knowledge-base chat system

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Document, DocumentStatus};

/// Result type alias for kb-chat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown to chat clients whenever a turn fails
pub const CHAT_FAILURE_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// kb-chat errors
#[derive(Debug, Error)]
pub enum Error {
    /// Request rejected before any side effect
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Record not found
    #[error("{0}")]
    NotFound(String),

    /// Chat rate limit exceeded
    #[error("Too many chat requests, please slow down")]
    RateLimited,

    /// Text extraction failed (unparseable PDF, unreachable URL, ...)
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Scraped page had no text left after cleanup
    #[error("No readable content found at the URL")]
    EmptyContent,

    /// The external index rejected or never received the chunks
    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    /// Context retrieval from the index failed
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// The generation endpoint failed or produced a malformed stream
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A terminal status was already committed for this document
    #[error("Document {id} is already {status}")]
    InvalidTransition { id: Uuid, status: DocumentStatus },

    /// A document pipeline failed after its record was created
    #[error("Document {} failed: {source}", document.id)]
    Pipeline {
        document: Box<Document>,
        #[source]
        source: Box<Error>,
    },

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an extraction error
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Create an ingestion error
    pub fn ingestion(message: impl Into<String>) -> Self {
        Self::Ingestion(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap a failure that happened after `document` was recorded
    pub fn pipeline(document: Document, source: Error) -> Self {
        Self::Pipeline {
            document: Box::new(document),
            source: Box::new(source),
        }
    }

    /// Short, non-technical description stored on failed documents
    pub fn user_message(&self) -> String {
        self.parts().2
    }

    /// Status code, error type and client-facing message
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Error::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                self.to_string(),
            ),
            Error::Extraction(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "extraction_error",
                "Failed to extract text from the document".to_string(),
            ),
            Error::EmptyContent => (
                StatusCode::BAD_REQUEST,
                "extraction_error",
                self.to_string(),
            ),
            Error::Ingestion(_) => (
                StatusCode::BAD_GATEWAY,
                "ingestion_error",
                "Document stored but indexing failed".to_string(),
            ),
            Error::Retrieval(_) | Error::Generation(_) => (
                StatusCode::BAD_GATEWAY,
                "chat_error",
                CHAT_FAILURE_MESSAGE.to_string(),
            ),
            Error::InvalidTransition { .. } => (
                StatusCode::CONFLICT,
                "conflict",
                "Document has already finished processing".to_string(),
            ),
            Error::Pipeline { source, .. } => source.parts(),
            Error::Database(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Http(_)
            | Error::Config(_)
            | Error::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = match &self {
            Error::Pipeline { document, .. } => json!({
                "error": {
                    "type": error_type,
                    "message": message,
                },
                "document": document,
            }),
            _ => json!({
                "error": {
                    "type": error_type,
                    "message": message,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;

    #[test]
    fn test_internal_causes_are_not_exposed() {
        let err = Error::internal("connection string postgres://secret");
        let (status, kind, message) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(kind, "server_error");
        assert!(!message.contains("secret"));
    }

    #[test]
    fn test_pipeline_uses_source_status() {
        let doc = Document::pending(SourceKind::File, "a.pdf", "/tmp/a.pdf", Uuid::new_v4());
        let err = Error::pipeline(doc, Error::ingestion("HTTP 500"));
        let (status, kind, message) = err.parts();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(kind, "ingestion_error");
        assert_eq!(message, "Document stored but indexing failed");
    }

    #[test]
    fn test_generation_failure_uses_fixed_message() {
        let err = Error::generation("HTTP 429 quota exceeded");
        assert_eq!(err.user_message(), CHAT_FAILURE_MESSAGE);
    }
}
