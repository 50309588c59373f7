//! Core translation engine module

pub mod chain;
pub mod client;
pub mod config;
pub mod errors;
pub mod llm;
pub mod models;
pub mod parser;
pub mod prompt;
