//! kb-chat: knowledge-base chat with document ingestion and streamed answers
//!
//! Admins upload PDF/TXT files or scrape web pages; the text is chunked and
//! sent to an external RAG service for indexing. Authenticated users ask
//! questions and receive answers generated from retrieved context, streamed
//! fragment by fragment.

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod server;
pub mod storage;
pub mod types;

pub use config::KbConfig;
pub use error::{Error, Result};
pub use types::{ChatExchange, ChatMessage, Document, DocumentStatus, SourceKind, User};
