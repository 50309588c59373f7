//! CLI command definitions and handlers

use clap::Subcommand;
use dialoguer::Password;
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

use crate::core::chain::TranslationChain;
use crate::core::client::ZhipuChatModel;
use crate::core::config::TranslatorConfig;
use crate::core::llm::{ChatModel, EchoChatModel};
use crate::core::models::TranslationInput;

/// Commands for the translation chain service
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP API server
    Serve {
        /// Bind address (default: localhost)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (default: 8000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Answer with the input text instead of calling the provider
        #[arg(long)]
        echo: bool,
    },

    /// Translate a single text and print the result
    Invoke {
        /// Text to translate
        #[arg(short, long)]
        text: String,

        /// Target language, e.g. "French"
        #[arg(short, long)]
        language: String,

        /// Print chunks as they arrive
        #[arg(long)]
        stream: bool,

        /// Answer with the input text instead of calling the provider
        #[arg(long)]
        echo: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Serve {
            host: None,
            port: None,
            echo: false,
        }
    }
}

/// Ask the operator for the provider credential without echoing it
fn prompt_api_key() -> anyhow::Result<String> {
    let api_key: String = Password::new()
        .with_prompt("ZhipuAI API key")
        .interact()?;

    let api_key = api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!("API key is required");
    }

    Ok(api_key.to_string())
}

/// Build the translation chain, prompting for the credential if none is configured
pub fn build_chain(config: &mut TranslatorConfig, echo: bool) -> anyhow::Result<TranslationChain> {
    let prompt = config.prompt_template()?;

    let model: Arc<dyn ChatModel> = if echo {
        info!("Using echo model; provider calls are disabled");
        Arc::new(EchoChatModel)
    } else {
        if config.api_key.is_empty() {
            config.api_key = prompt_api_key()?;
        }
        Arc::new(ZhipuChatModel::new(config)?)
    };

    Ok(TranslationChain::new(prompt, model))
}

/// Handle server command
pub async fn handle_serve(
    mut config: TranslatorConfig,
    host: Option<String>,
    port: Option<u16>,
    echo: bool,
) -> anyhow::Result<()> {
    use crate::server::api::run_server;

    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let chain = build_chain(&mut config, echo)?;

    info!("Starting HTTP server on {}", config.bind_address());
    println!("🚀 Server starting on http://{}", config.bind_address());
    println!("📊 API Documentation: http://{}/docs", config.bind_address());

    run_server(Arc::new(chain), &config.host, config.port).await
}

/// Handle one-shot translation command
pub async fn handle_invoke(
    mut config: TranslatorConfig,
    text: String,
    language: String,
    stream: bool,
    echo: bool,
) -> anyhow::Result<()> {
    let chain = build_chain(&mut config, echo)?;
    let input = TranslationInput::new(text, language);

    if stream {
        let mut chunks = chain.translate_stream(&input);
        let mut stdout = std::io::stdout();
        while let Some(chunk) = chunks.next().await {
            write!(stdout, "{}", chunk?)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        println!("{}", chain.translate(&input).await?);
    }

    Ok(())
}
