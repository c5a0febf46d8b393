//! Document records and their processing status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a document's text comes from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Uploaded PDF or text file stored in the upload directory
    File,
    /// Web page scraped at ingestion time
    Url,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Url => "url",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(Self::File),
            "url" => Some(Self::Url),
            _ => None,
        }
    }
}

/// Lifecycle status of a document
///
/// `Pending` is the only non-terminal value. Once a document reaches
/// `Processed` or `Failed` the status is never written again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal statuses are never overwritten
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document accepted for ingestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// File upload or scraped URL
    pub source: SourceKind,
    /// Display name (original filename or the URL)
    pub name: String,
    /// Filesystem path for files, source URL for pages
    pub locator: String,
    /// Lifecycle status
    pub status: DocumentStatus,
    /// User who uploaded or scraped the document
    pub uploaded_by: Uuid,
    /// Number of chunks submitted to the index (0 until processed)
    pub chunk_count: u32,
    /// Short failure reason, set only when the status is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Record creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a new pending document
    pub fn pending(
        source: SourceKind,
        name: impl Into<String>,
        locator: impl Into<String>,
        uploaded_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            name: name.into(),
            locator: locator.into(),
            status: DocumentStatus::Pending,
            uploaded_by,
            chunk_count: 0,
            error: None,
            created_at: Utc::now(),
        }
    }
}

/// Index entry ID: `{documentId}_{ordinal}`
pub fn chunk_id(document_id: Uuid, ordinal: usize) -> String {
    format!("{}_{}", document_id, ordinal)
}

/// Terminal outcome committed by the lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// All chunks were accepted by the index
    Processed { chunk_count: u32 },
    /// Extraction or ingestion failed
    Failed { reason: String },
}

impl DocumentOutcome {
    pub fn status(&self) -> DocumentStatus {
        match self {
            Self::Processed { .. } => DocumentStatus::Processed,
            Self::Failed { .. } => DocumentStatus::Failed,
        }
    }
}

/// Document with the uploader's username resolved, as listed to admins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: Document,
    /// `None` when the uploader no longer exists
    pub uploaded_by_username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ids_are_traceable() {
        let doc = Document::pending(SourceKind::File, "a.txt", "/tmp/a.txt", Uuid::new_v4());
        assert_eq!(chunk_id(doc.id, 0), format!("{}_0", doc.id));
        assert_eq!(chunk_id(doc.id, 12), format!("{}_12", doc.id));
    }

    #[test]
    fn test_status_round_trip_and_terminal() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Processed,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
        assert!(!DocumentStatus::Pending.is_terminal());
        assert!(DocumentStatus::Processed.is_terminal());
        assert!(DocumentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_serializes_lowercase() {
        let doc = Document::pending(SourceKind::Url, "https://x.test", "https://x.test", Uuid::new_v4());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["source"], "url");
        assert!(json.get("error").is_none());
    }
}
