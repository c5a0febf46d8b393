//! Provider abstractions for the external index and the generation model
//!
//! The orchestration code only sees the traits, so tests and alternative
//! backends can be swapped in without touching the pipeline.

pub mod index;
pub mod llm;
pub mod ollama;
pub mod rag_service;

pub use index::IndexProvider;
pub use llm::{FragmentStream, LlmProvider};
pub use ollama::OllamaLlm;
pub use rag_service::RagServiceClient;
