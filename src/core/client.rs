//! Hosted chat-completions client (ZhipuAI GLM, OpenAI-compatible wire format)

use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{future, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::llm::{ChatModel, CompletionStream};
use crate::core::models::{ChatCompletion, ChatMessage, TokenUsage};

/// Marker the provider sends after the last streamed chunk
const STREAM_DONE: &str = "[DONE]";

/// Chat model backed by the ZhipuAI open platform
#[derive(Clone)]
pub struct ZhipuChatModel {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceContent>,
    delta: Option<ChoiceContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceContent {
    content: Option<String>,
}

impl ZhipuChatModel {
    /// Create a client; the credential comes from `config.api_key`
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        config.validate().map_err(|e| TranslationError::ConfigError {
            message: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Send the request and turn non-success statuses into errors
    async fn post(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let error_text = response.text().await.unwrap_or_default();
        warn!("Provider returned {}: {}", status_code, error_text);

        match status_code {
            401 | 403 => Err(TranslationError::AuthenticationError {
                message: error_text,
            }),
            _ => Err(TranslationError::ApiError {
                status: status_code,
                message: error_text,
            }),
        }
    }
}

/// Convert one decoded body (full or streamed) into a completion
fn parse_completion(body: &str, fallback_model: &str, streamed: bool) -> Result<ChatCompletion> {
    let parsed: CompletionResponse =
        serde_json::from_str(body).map_err(|e| TranslationError::InvalidResponseError {
            message: format!("{}: {}", e, body),
        })?;

    let choice = parsed.choices.into_iter().next();
    let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
    let content = choice
        .and_then(|c| if streamed { c.delta } else { c.message })
        .and_then(|m| m.content);

    let content = match (content, streamed) {
        (Some(content), _) => content,
        // Trailing stream chunks may carry only usage or a finish reason.
        (None, true) => String::new(),
        (None, false) => {
            return Err(TranslationError::InvalidResponseError {
                message: "No completion in response".to_string(),
            })
        }
    };

    Ok(ChatCompletion {
        content,
        model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        finish_reason,
        usage: parsed.usage,
        id: parsed.id,
    })
}

#[async_trait]
impl ChatModel for ZhipuChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
        let response = self.post(messages, false).await?;
        let body = response.text().await?;
        let completion = parse_completion(&body, &self.model, false)?;

        if let Some(usage) = completion.usage {
            debug!(
                "Completion from {} used {} tokens ({} prompt, {} completion)",
                completion.model, usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(completion)
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
        let response = self.post(messages, true).await?;
        let model = self.model.clone();

        let chunks = response
            .bytes_stream()
            .eventsource()
            .map_err(|e| match e {
                EventStreamError::Transport(e) => TranslationError::from(e),
                other => TranslationError::InvalidResponseError {
                    message: other.to_string(),
                },
            })
            .try_take_while(|event| future::ready(Ok(event.data.trim() != STREAM_DONE)))
            .map(move |event| event.and_then(|event| parse_completion(&event.data, &model, true)));

        Ok(chunks.boxed())
    }
}
