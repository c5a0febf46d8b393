//! HTTP client for the external RAG/index service

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::RagServiceConfig;
use crate::error::{Error, Result};
use crate::types::chunk_id;

use super::index::IndexProvider;

/// Client for `POST /ingest`, `POST /reset`, `POST /retrieve` and `GET /health`
pub struct RagServiceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct IngestRequest<'a> {
    documents: &'a [&'a str],
    ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    n_results: usize,
}

#[derive(Debug, Default, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    documents: Vec<String>,
}

impl RagServiceClient {
    /// Create a new client; every request is bounded by the configured timeout
    pub fn new(config: &RagServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl IndexProvider for RagServiceClient {
    async fn ingest(&self, document_id: Uuid, chunks: &[&str]) -> Result<()> {
        if chunks.is_empty() {
            return Err(Error::ingestion("document produced no text"));
        }

        let request = IngestRequest {
            documents: chunks,
            ids: (0..chunks.len()).map(|i| chunk_id(document_id, i)).collect(),
        };

        let response = self
            .client
            .post(self.url("/ingest"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ingestion(format!("Ingest request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ingestion(format!("Ingest failed: HTTP {} - {}", status, body)));
        }

        tracing::debug!("Indexed {} chunks for document {}", chunks.len(), document_id);
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let response = self
            .client
            .post(self.url("/reset"))
            .send()
            .await
            .map_err(|e| Error::ingestion(format!("Reset request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::ingestion(format!(
                "Reset failed: HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<String>> {
        let request = RetrieveRequest {
            query: question,
            n_results: top_k,
        };

        let response = self
            .client
            .post(self.url("/retrieve"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Retrieval(format!("Retrieve request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Retrieval(format!(
                "Retrieve failed: HTTP {}",
                response.status()
            )));
        }

        let body: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| Error::Retrieval(format!("Failed to parse retrieve response: {}", e)))?;

        Ok(body
            .documents
            .into_iter()
            .filter(|d| !d.trim().is_empty())
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("/health")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "rag-service"
    }
}
