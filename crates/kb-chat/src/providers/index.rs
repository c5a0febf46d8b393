//! Index provider trait for the external retrieval service

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Trait for the external vector index
///
/// Implementations:
/// - `RagServiceClient`: HTTP service exposing `/ingest`, `/reset`, `/retrieve`
#[async_trait]
pub trait IndexProvider: Send + Sync {
    /// Submit all chunks of a document as one batch.
    ///
    /// Entry IDs are `{document_id}_{ordinal}`. Any failure, whatever its
    /// cause, is reported as [`crate::Error::Ingestion`].
    async fn ingest(&self, document_id: Uuid, chunks: &[&str]) -> Result<()>;

    /// Clear the whole index; idempotent
    async fn reset(&self) -> Result<()>;

    /// Ranked context snippets for a question (possibly empty)
    async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<String>>;

    /// Check if the service is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
