//! Configuration for the knowledge-base chat server
//!
//! Every section has defaults, so a TOML file only needs the values it
//! changes. Environment variables are applied last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Database and upload directory locations
    pub storage: StorageConfig,
    /// Upload validation limits
    pub upload: UploadConfig,
    /// Web page scraping
    pub scraper: ScraperConfig,
    /// External RAG/index service
    pub rag_service: RagServiceConfig,
    /// Streaming generation endpoint (Ollama-compatible)
    pub llm: LlmConfig,
    /// Text chunking
    pub chunking: ChunkingConfig,
    /// Chat turn settings
    pub chat: ChatConfig,
    /// Authentication
    pub auth: AuthConfig,
}

impl KbConfig {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML document; missing sections and fields keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply `PORT`, `RAG_SERVICE_URL`, `LLM_BASE_URL`, `LLM_MODEL` and `KB_CHAT_DATA_DIR`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(url) = lookup("RAG_SERVICE_URL") {
            self.rag_service.base_url = url;
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.generate_model = model;
        }
        if let Some(dir) = lookup("KB_CHAT_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Key chat rate limits on `X-Forwarded-For` instead of the socket peer
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            enable_cors: true,
            trust_proxy: false,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for the database and uploads
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
            .join("kb-chat");
        Self { data_dir }
    }
}

impl StorageConfig {
    /// SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("kb-chat.db")
    }

    /// Directory holding uploaded files
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

/// Upload validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes (default: 10MB)
    pub max_file_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// Web page scraping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Browser user agent; some sites block default HTTP clients
    pub user_agent: String,
    /// Fetch timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            timeout_secs: 20,
        }
    }
}

/// External RAG/index service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagServiceConfig {
    /// Base URL (`/ingest`, `/reset`, `/retrieve`, `/health`)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of context snippets retrieved per question
    pub top_k: usize,
}

impl Default for RagServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".to_string(),
            timeout_secs: 60,
            top_k: 3,
        }
    }
}

/// Generation endpoint (Ollama-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds, covering the whole streamed response
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
        }
    }
}

/// Text chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 1000 }
    }
}

/// Chat turn settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Prior exchanges loaded when the request carries no history
    pub history_turns: usize,
    /// Longest accepted question in characters
    pub max_question_chars: usize,
    /// Chat requests allowed per client per minute
    pub requests_per_minute: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_turns: 3,
            max_question_chars: 2000,
            requests_per_minute: 30,
        }
    }
}

/// Authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime in days
    pub token_ttl_days: i64,
    /// Grant admin rights to the first account registered
    pub first_user_is_admin: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_days: 30,
            first_user_is_admin: true,
        }
    }
}
