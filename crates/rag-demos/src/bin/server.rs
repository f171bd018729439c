//! Demo server binary
//!
//! Run with: cargo run -p rag-demos --bin rag-demos-server -- --config demos.toml

use clap::Parser;
use rag_demos::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rag-demos-server", version, about = "Serve one RAG demo over HTTP")]
struct Cli {
    /// TOML config file (defaults to $RAG_DEMOS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Demo profile, overriding config and DEMO_PROFILE
    #[arg(short = 'd', long)]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_demos=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = RagConfig::load(cli.config.as_deref())?;
    if let Some(profile) = cli.profile {
        config.demo.profile = profile.parse()?;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Demo profile: {}", config.demo.profile.as_str());
    tracing::info!("  - LLM: {:?} ({})", config.llm.backend, config.llm.model);
    tracing::info!(
        "  - Embeddings: {:?} ({}, {} dims)",
        config.embeddings.backend,
        config.embeddings.model,
        config.embeddings.dimensions
    );
    tracing::info!("  - Vector store: {:?}", config.vector_store.backend);
    tracing::info!("  - Chunk size: {}", config.chunking.chunk_size);

    let server = RagServer::new(config)?;

    println!("\nServer starting...");
    println!("  Demo:   http://{}/", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  Info:   http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
