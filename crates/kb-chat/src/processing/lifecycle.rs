//! Document lifecycle: record creation, extraction, indexing and deletion
//!
//! Only [`DocumentManager`] writes document status. Extractors and the index
//! provider return outcomes; the manager turns them into exactly one terminal
//! transition per document.

use reqwest::Url;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::{extract_text, parse_url, FileKind, TextChunker, UploadedFile, WebScraper};
use crate::providers::IndexProvider;
use crate::storage::{Database, FileStore};
use crate::types::{Document, DocumentOutcome, DocumentStatus, DocumentView, SourceKind};

use super::progress::{IngestStage, ProgressHub};

/// Coordinates the document pipeline and admin document operations
pub struct DocumentManager {
    db: Arc<Database>,
    index: Arc<dyn IndexProvider>,
    files: FileStore,
    scraper: WebScraper,
    progress: Arc<ProgressHub>,
    chunker: TextChunker,
    max_file_size: usize,
}

impl DocumentManager {
    pub fn new(
        db: Arc<Database>,
        index: Arc<dyn IndexProvider>,
        files: FileStore,
        scraper: WebScraper,
        progress: Arc<ProgressHub>,
        chunker: TextChunker,
        max_file_size: usize,
    ) -> Self {
        Self {
            db,
            index,
            files,
            scraper,
            progress,
            chunker,
            max_file_size,
        }
    }

    /// Store an uploaded PDF/TXT file and run it through the pipeline.
    ///
    /// Type and size are validated before the file is written or a record
    /// created. A failure after that point returns [`Error::Pipeline`]
    /// carrying the failed record; the stored file is kept.
    ///
    /// Past validation the pipeline runs on its own task, so dropping the
    /// returned future never leaves a record in `pending`.
    pub async fn ingest_file(self: &Arc<Self>, uploader: Uuid, file: UploadedFile) -> Result<Document> {
        let kind = file.validate(self.max_file_size)?;

        let manager = Arc::clone(self);
        joined(tokio::spawn(async move { manager.run_file(uploader, kind, file).await })).await
    }

    /// Scrape a web page and run its text through the pipeline
    pub async fn ingest_url(self: &Arc<Self>, uploader: Uuid, raw_url: &str) -> Result<Document> {
        let url = parse_url(raw_url)?;

        let manager = Arc::clone(self);
        joined(tokio::spawn(async move { manager.run_url(uploader, url).await })).await
    }

    async fn run_file(&self, uploader: Uuid, kind: FileKind, file: UploadedFile) -> Result<Document> {
        let path = self.files.save(&file.filename, &file.data).await?;
        let document = Document::pending(
            SourceKind::File,
            file.filename.clone(),
            path.to_string_lossy(),
            uploader,
        );

        if let Err(e) = self.db.insert_document(&document) {
            if let Err(cleanup) = self.files.remove_if_present(&path).await {
                tracing::warn!("Failed to remove orphaned upload {}: {}", path.display(), cleanup);
            }
            return Err(e);
        }

        tracing::info!(
            "Received file {} ({} bytes) as document {}",
            document.name,
            file.data.len(),
            document.id
        );
        self.progress.publish(document.id, IngestStage::Received);

        self.progress.publish(document.id, IngestStage::Extracting);
        let text = extract_text(kind, file.data).await;

        self.finish(document, text).await
    }

    async fn run_url(&self, uploader: Uuid, url: Url) -> Result<Document> {
        let document = Document::pending(SourceKind::Url, url.as_str(), url.as_str(), uploader);
        self.db.insert_document(&document)?;

        tracing::info!("Received URL {} as document {}", url, document.id);
        self.progress.publish(document.id, IngestStage::Received);

        self.progress.publish(document.id, IngestStage::Extracting);
        let text = self.scraper.fetch_text(&url).await;

        self.finish(document, text).await
    }

    async fn finish(&self, document: Document, text: Result<String>) -> Result<Document> {
        let indexed = match text {
            Ok(text) => self.index_text(document.id, &text).await,
            Err(e) => Err(e),
        };

        match indexed {
            Ok(chunk_count) => {
                tracing::info!("Document {} processed: {} chunks", document.id, chunk_count);
                self.complete(document.id, DocumentOutcome::Processed { chunk_count })
            }
            Err(cause) => {
                tracing::warn!("Document {} failed: {}", document.id, cause);
                let failed = self.complete(
                    document.id,
                    DocumentOutcome::Failed {
                        reason: cause.user_message(),
                    },
                )?;
                Err(Error::pipeline(failed, cause))
            }
        }
    }

    async fn index_text(&self, document_id: Uuid, text: &str) -> Result<u32> {
        self.progress.publish(document_id, IngestStage::Chunking);
        let chunks = self.chunker.chunk(text);

        self.progress.publish(document_id, IngestStage::Indexing);
        self.index.ingest(document_id, &chunks).await?;

        Ok(chunks.len() as u32)
    }

    /// Commit the terminal outcome of a pending document.
    ///
    /// A document that already left `pending` is rejected with
    /// [`Error::InvalidTransition`] and left unchanged.
    pub fn complete(&self, id: Uuid, outcome: DocumentOutcome) -> Result<Document> {
        if !self.db.complete_document(id, &outcome)? {
            return match self.db.get_document(id)? {
                Some(existing) if existing.status.is_terminal() => Err(Error::InvalidTransition {
                    id,
                    status: existing.status,
                }),
                Some(_) => Err(Error::internal(format!(
                    "Terminal status of document {} was not recorded",
                    id
                ))),
                None => Err(Error::NotFound("Document not found".to_string())),
            };
        }

        let stage = match outcome.status() {
            DocumentStatus::Processed => IngestStage::Processed,
            _ => IngestStage::Failed,
        };
        self.progress.publish(id, stage);

        self.db
            .get_document(id)?
            .ok_or_else(|| Error::NotFound("Document not found".to_string()))
    }

    /// Delete a document, its backing file and (best effort) the index.
    ///
    /// An unknown id fails with [`Error::NotFound`] before anything changes.
    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        let document = self
            .db
            .get_document(id)?
            .ok_or_else(|| Error::NotFound("Document not found".to_string()))?;

        if document.source == SourceKind::File {
            self.remove_backing_file(&document).await?;
        }

        self.db.delete_document(id)?;
        self.progress.forget(id);
        tracing::info!("Deleted document {} ({})", id, document.name);

        self.reset_index().await;
        Ok(())
    }

    /// Remove the stored files of every document uploaded by `user_id`.
    ///
    /// Returns the number of documents owned by the user; records are left
    /// for the caller's cascade.
    pub async fn remove_uploader_files(&self, user_id: Uuid) -> Result<usize> {
        let documents = self.db.list_documents_by_uploader(user_id)?;

        for document in documents.iter().filter(|d| d.source == SourceKind::File) {
            self.remove_backing_file(document).await?;
        }
        for document in &documents {
            self.progress.forget(document.id);
        }

        Ok(documents.len())
    }

    async fn remove_backing_file(&self, document: &Document) -> Result<()> {
        let path = Path::new(&document.locator);
        if !self.files.remove_if_present(path).await? {
            tracing::warn!(
                "Backing file of document {} was already missing: {}",
                document.id,
                path.display()
            );
        }
        Ok(())
    }

    /// Clear the external index; failures are logged and swallowed
    pub async fn reset_index(&self) {
        if let Err(e) = self.index.reset().await {
            tracing::warn!("Index reset via {} failed: {}", self.index.name(), e);
        }
    }

    /// All documents, newest first, with uploader usernames
    pub fn list_documents(&self) -> Result<Vec<DocumentView>> {
        self.db.list_documents_with_uploader()
    }

    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        self.db.get_document(id)
    }
}

async fn joined(handle: JoinHandle<Result<Document>>) -> Result<Document> {
    handle
        .await
        .map_err(|e| Error::internal(format!("Document pipeline aborted: {}", e)))?
}
