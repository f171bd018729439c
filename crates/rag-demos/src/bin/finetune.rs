//! Fine-tuning tool
//!
//! Run with: cargo run -p rag-demos --bin rag-demos-finetune -- --action upload

use clap::Parser;
use rag_demos::config::RagConfig;
use rag_demos::finetune::{FineTuneAction, FineTuner};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rag-demos-finetune", version, about = "Upload training data and manage fine-tuning jobs")]
struct Cli {
    /// Action to run
    #[arg(short, long, env = "ACTION", value_enum)]
    action: FineTuneAction,

    /// File id for `create`, job id for `retrieve`
    #[arg(long, env = "FINETUNE_ID")]
    id: Option<String>,

    /// Fine-tuned model name for `ask`
    #[arg(long, env = "FINETUNE_MODEL")]
    model: Option<String>,

    /// TOML config file (defaults to $RAG_DEMOS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_demos=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref())?;

    let tuner = FineTuner::new(&config)?;
    let outcome = tuner
        .run(cli.action, cli.id.as_deref(), cli.model.as_deref())
        .await?;
    println!("{}", outcome);

    Ok(())
}
