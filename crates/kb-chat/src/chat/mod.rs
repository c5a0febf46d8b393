//! Retrieval-augmented chat

pub mod history;
pub mod orchestrator;

use uuid::Uuid;

pub use history::get_history;
pub use orchestrator::{ChatOrchestrator, ChatStream};

/// Event emitted during a chat turn
///
/// Zero or more `Fragment`s in generation order, then exactly one of `Done`
/// or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Fragment(String),
    Done { exchange_id: Uuid },
    Error { message: String },
}
