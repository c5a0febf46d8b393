//! Text extraction for uploaded files (PDF and plain text only)

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Rejection message for anything other than PDF or TXT
pub const UNSUPPORTED_TYPE_MESSAGE: &str = "Only PDF and TXT files are allowed";

/// Accepted upload formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Txt,
}

impl FileKind {
    /// Detect the kind from the file extension, falling back to the
    /// declared MIME type and then to a guess from the filename.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => return Ok(Self::Pdf),
            Some("txt") => return Ok(Self::Txt),
            _ => {}
        }

        let mime = content_type
            .map(|c| c.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .or_else(|| {
                mime_guess::from_path(filename)
                    .first()
                    .map(|m| m.essence_str().to_string())
            });

        match mime.as_deref() {
            Some("application/pdf") => Ok(Self::Pdf),
            Some("text/plain") => Ok(Self::Txt),
            _ => Err(Error::validation(UNSUPPORTED_TYPE_MESSAGE)),
        }
    }
}

/// A file received from a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original filename as sent by the client
    pub filename: String,
    /// Declared MIME type, if any
    pub content_type: Option<String>,
    /// File content
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data: data.into(),
        }
    }

    /// Check type and size before anything is persisted
    pub fn validate(&self, max_file_size: usize) -> Result<FileKind> {
        let kind = FileKind::detect(&self.filename, self.content_type.as_deref())?;
        if self.data.len() > max_file_size {
            return Err(Error::validation(too_large_message(max_file_size)));
        }
        Ok(kind)
    }
}

/// Rejection message for oversize uploads
pub fn too_large_message(max_file_size: usize) -> String {
    format!(
        "File too large. Max size is {}MB.",
        max_file_size.div_ceil(1024 * 1024)
    )
}

/// Extract plain text from file content
pub async fn extract_text(kind: FileKind, data: Bytes) -> Result<String> {
    match kind {
        FileKind::Pdf => {
            // pdf-extract is CPU-bound and may panic on malformed input
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
                .await
                .map_err(|e| Error::extraction(format!("PDF parser aborted: {}", e)))?
                .map_err(|e| Error::extraction(format!("Unparseable PDF: {}", e)))
        }
        FileKind::Txt => String::from_utf8(data.to_vec())
            .map_err(|e| Error::extraction(format!("Text file is not valid UTF-8: {}", e))),
    }
}
