//! Translation chain service
//!
//! Composes a prompt template, a hosted chat model and a string output parser
//! into one pipeline and serves it over HTTP under `/chain`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod core;
pub mod server;

// Re-export key types for convenience
pub use crate::core::{
    chain::{Chain, ChainValue, Stage, TranslationChain},
    client::ZhipuChatModel,
    config::TranslatorConfig,
    errors::TranslationError,
    llm::{ChatModel, EchoChatModel},
    models::{ChatCompletion, ChatMessage, Role, TranslationInput},
    parser::StrOutputParser,
    prompt::ChatPromptTemplate,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
