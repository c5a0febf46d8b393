//! Knowledge-base chat server binary
//!
//! Run with: cargo run -p kb-chat --bin kb-chat-server -- --config kb-chat.toml

use clap::Parser;
use kb_chat::{config::KbConfig, server::KbServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kb-chat-server", version, about = "Knowledge-base chat server")]
struct Cli {
    /// Path to a TOML configuration file; defaults apply when omitted
    #[arg(long, env = "KB_CHAT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kb_chat=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = KbConfig::load(cli.config.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data dir: {}", config.storage.data_dir.display());
    tracing::info!("  - RAG service: {}", config.rag_service.base_url);
    tracing::info!("  - LLM: {} ({})", config.llm.base_url, config.llm.generate_model);
    tracing::info!("  - Max upload: {} bytes", config.upload.max_file_size);

    let server = KbServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/auth/register   - Create an account");
    println!("  POST /api/admin/upload    - Upload a PDF or TXT document");
    println!("  POST /api/admin/scrape    - Ingest a web page");
    println!("  POST /api/chat/ask        - Ask a question (SSE stream)");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
