//! Live ingestion progress for admin clients

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Ingestion pipeline stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Received,
    Extracting,
    Chunking,
    Indexing,
    Processed,
    Failed,
}

impl IngestStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }
}

/// One stage change of one document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageEvent {
    pub document_id: Uuid,
    pub stage: IngestStage,
    pub at: DateTime<Utc>,
}

/// Fan-out of stage events plus the latest stage per document
pub struct ProgressHub {
    sender: broadcast::Sender<StageEvent>,
    latest: DashMap<Uuid, StageEvent>,
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            latest: DashMap::new(),
        }
    }

    /// Record and broadcast a stage; having no subscribers is fine.
    ///
    /// Terminal stages are broadcast but not kept: the stored document
    /// status answers for finished documents, so the map only holds
    /// documents still in flight.
    pub fn publish(&self, document_id: Uuid, stage: IngestStage) {
        let event = StageEvent {
            document_id,
            stage,
            at: Utc::now(),
        };
        tracing::debug!(%document_id, ?stage, "ingest stage");
        if stage.is_terminal() {
            self.latest.remove(&document_id);
        } else {
            self.latest.insert(document_id, event.clone());
        }
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.sender.subscribe()
    }

    pub fn latest(&self, document_id: Uuid) -> Option<StageEvent> {
        self.latest.get(&document_id).map(|e| e.value().clone())
    }

    /// Drop the entry of a deleted document
    pub fn forget(&self, document_id: Uuid) {
        self.latest.remove(&document_id);
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(256)
    }
}
