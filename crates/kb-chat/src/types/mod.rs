//! Core types for the knowledge-base chat system

pub mod chat;
pub mod document;
pub mod user;

pub use chat::{flatten_exchanges, ChatExchange, ChatMessage, Role};
pub use document::{
    chunk_id, Document, DocumentOutcome, DocumentStatus, DocumentView, SourceKind,
};
pub use user::{AuthResponse, Session, User};
