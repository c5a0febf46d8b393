//! Chat messages and persisted exchanges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message as shown in a chat view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Clients may omit it when sending history back
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
        }
    }
}

/// A completed question/answer turn, persisted as one record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatExchange {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
    pub answered_at: DateTime<Utc>,
}

impl ChatExchange {
    pub fn new(
        user_id: Uuid,
        question: impl Into<String>,
        answer: impl Into<String>,
        asked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            question: question.into(),
            answer: answer.into(),
            asked_at,
            answered_at: Utc::now(),
        }
    }

    /// The user message followed by the assistant reply
    pub fn messages(&self) -> [ChatMessage; 2] {
        [
            ChatMessage::user(self.question.clone(), self.asked_at),
            ChatMessage::assistant(self.answer.clone(), self.answered_at),
        ]
    }
}

/// Flatten exchanges (oldest first) into messages in arrival order
pub fn flatten_exchanges(exchanges: &[ChatExchange]) -> Vec<ChatMessage> {
    exchanges.iter().flat_map(|e| e.messages()).collect()
}
