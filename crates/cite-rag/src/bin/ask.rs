//! One-shot question answering from the command line
//!
//! Run with: cargo run -p cite-rag --features cli --bin cite-rag-ask -- \
//!     --config rag.toml --collection manuals "How do I reset the device?"

use clap::Parser;
use cite_rag::{RagConfig, RagEngine};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ask a question over one or more document collections.
///
/// Gemini keys are read from `GEMINI_API_KEY` and `GEMINI_API_KEY_2`..`_9`.
#[derive(Parser)]
#[command(name = "cite-rag-ask", version)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Collection to search; repeat for several
    #[arg(long = "collection", short = 'c', required = true)]
    collections: Vec<String>,

    /// Print the gateway tiers after answering
    #[arg(long)]
    status: bool,

    /// The question
    question: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cite_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RagConfig::from_file(path)?,
        None => RagConfig::default(),
    };
    tracing::info!("Configuration loaded");
    tracing::info!("  - Primary tier: {} {:?}", config.gateway.primary.kind, config.gateway.primary.models);
    tracing::info!("  - Milvus: {}", config.milvus.base_url);

    let engine = RagEngine::from_env(&config)?;
    let answer = engine.ask(&cli.question, &cli.collections).await;

    println!("{}\n", answer.text);

    if answer.is_no_results() {
        if !answer.suggestions.is_empty() {
            println!("You could ask:");
            for suggestion in &answer.suggestions {
                println!("  - {}", suggestion);
            }
        }
    } else {
        println!("Sources:");
        for (i, citation) in answer.citations.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, citation.format_inline(), citation.collection_id);
        }
    }

    if cli.status {
        println!("\n{}", serde_json::to_string_pretty(&engine.gateway_status())?);
    }

    Ok(())
}
