//! LLM provider trait for streamed answer generation

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

/// Answer fragments in the order the model produced them
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Trait for streaming text generation
///
/// Implementations:
/// - `OllamaLlm`: Ollama `/api/generate` with NDJSON streaming
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Start generating and return the fragment stream.
    ///
    /// Dropping the stream abandons the underlying request.
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
