//! Application state for the chat server

use std::sync::Arc;

use crate::auth::AccountService;
use crate::chat::ChatOrchestrator;
use crate::config::KbConfig;
use crate::error::{Error, Result};
use crate::ingestion::{TextChunker, WebScraper};
use crate::processing::{DocumentManager, ProgressHub};
use crate::providers::{IndexProvider, LlmProvider, OllamaLlm, RagServiceClient};
use crate::storage::{Database, FileStore};

use super::rate_limit::ChatRateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: KbConfig,
    db: Arc<Database>,
    index: Arc<dyn IndexProvider>,
    documents: Arc<DocumentManager>,
    accounts: AccountService,
    chat: ChatOrchestrator,
    progress: Arc<ProgressHub>,
    chat_limiter: ChatRateLimiter,
}

impl AppState {
    /// Open the database under the data dir and connect the HTTP providers
    pub fn new(config: KbConfig) -> Result<Self> {
        tracing::info!("Initializing kb-chat state...");

        std::fs::create_dir_all(&config.storage.data_dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create data dir {}: {}",
                config.storage.data_dir.display(),
                e
            ))
        })?;

        let db = Arc::new(Database::open(config.storage.database_path())?);
        tracing::info!("Database opened at {}", config.storage.database_path().display());

        let index: Arc<dyn IndexProvider> = Arc::new(RagServiceClient::new(&config.rag_service)?);
        tracing::info!("RAG service at {}", config.rag_service.base_url);

        let llm: Arc<dyn LlmProvider> = Arc::new(OllamaLlm::new(&config.llm)?);
        tracing::info!("Generation via {} ({})", config.llm.base_url, llm.model());

        Self::with_providers(config, db, index, llm)
    }

    /// Assemble state around explicit providers
    pub fn with_providers(
        config: KbConfig,
        db: Arc<Database>,
        index: Arc<dyn IndexProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let progress = Arc::new(ProgressHub::default());

        let documents = Arc::new(DocumentManager::new(
            db.clone(),
            index.clone(),
            FileStore::new(config.storage.upload_dir()),
            WebScraper::new(&config.scraper)?,
            progress.clone(),
            TextChunker::new(config.chunking.max_chars),
            config.upload.max_file_size,
        ));

        let accounts = AccountService::new(db.clone(), documents.clone(), config.auth.clone());
        let chat = ChatOrchestrator::new(db.clone(), index.clone(), llm, &config);
        let chat_limiter = ChatRateLimiter::new(
            config.chat.requests_per_minute,
            config.server.trust_proxy,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                index,
                documents,
                accounts,
                chat,
                progress,
                chat_limiter,
            }),
        })
    }

    pub fn config(&self) -> &KbConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.inner.db
    }

    pub fn documents(&self) -> &Arc<DocumentManager> {
        &self.inner.documents
    }

    pub fn accounts(&self) -> &AccountService {
        &self.inner.accounts
    }

    pub fn chat(&self) -> &ChatOrchestrator {
        &self.inner.chat
    }

    pub fn progress(&self) -> &ProgressHub {
        &self.inner.progress
    }

    pub fn chat_limiter(&self) -> &ChatRateLimiter {
        &self.inner.chat_limiter
    }

    /// Ready once the RAG service answers its health check
    pub async fn is_ready(&self) -> bool {
        match self.inner.index.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!("Readiness check via {} failed: {}", self.inner.index.name(), e);
                false
            }
        }
    }
}
