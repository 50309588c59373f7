//! Main entry point for the translation chain server

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chain_translator::cli::commands::{self, Commands};
use chain_translator::TranslatorConfig;

/// Translate text into a requested language over HTTP
#[derive(Parser, Debug)]
#[command(name = "chain-translator", version, about, long_about = None)]
struct Args {
    /// API key for ZhipuAI (optional, defaults to ZHIPUAI_API_KEY env var, then an interactive prompt)
    #[arg(long)]
    api_key: Option<String>,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging (no effect when RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}={},tower_http={}", env!("CARGO_CRATE_NAME"), log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = TranslatorConfig::load(args.config.as_deref())?;
    if let Some(api_key) = args.api_key {
        config.api_key = api_key;
    }

    match args.command.unwrap_or_default() {
        Commands::Serve { host, port, echo } => {
            commands::handle_serve(config, host, port, echo).await?;
        }
        Commands::Invoke {
            text,
            language,
            stream,
            echo,
        } => {
            commands::handle_invoke(config, text, language, stream, echo).await?;
        }
    }

    Ok(())
}
