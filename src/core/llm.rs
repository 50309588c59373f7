//! Chat model interface

use async_trait::async_trait;
use futures::stream::{self, BoxStream};

use crate::core::errors::Result;
use crate::core::models::{ChatCompletion, ChatMessage, Role};

/// Stream of completion chunks
pub type CompletionStream = BoxStream<'static, Result<ChatCompletion>>;

/// A remote (or fake) chat model
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Name of the underlying model
    fn model_name(&self) -> &str;

    /// Single round trip returning the full completion
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatCompletion>;

    /// Completion as a stream of chunks
    ///
    /// Models without native streaming yield the whole completion as one chunk.
    async fn stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
        let completion = self.invoke(messages).await?;
        Ok(Box::pin(stream::once(async move { Ok(completion) })))
    }
}

/// Model that answers with the last user message verbatim
#[derive(Debug, Clone, Default)]
pub struct EchoChatModel;

impl EchoChatModel {
    /// Model name reported in completions
    pub const NAME: &'static str = "echo";
}

#[async_trait]
impl ChatModel for EchoChatModel {
    fn model_name(&self) -> &str {
        Self::NAME
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
        let content = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(ChatCompletion {
            finish_reason: Some("stop".to_string()),
            ..ChatCompletion::new(content, Self::NAME)
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::errors::TranslationError;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies "<language>|<text>" and streams it one character at a time
    #[derive(Debug, Default)]
    pub(crate) struct TaggingModel {
        calls: AtomicUsize,
    }

    impl TaggingModel {
        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for TaggingModel {
        fn model_name(&self) -> &str {
            "tagging"
        }

        async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let language = messages[0]
                .content
                .trim_start_matches("translate the following into ")
                .trim_end_matches(':');
            Ok(ChatCompletion::new(
                format!("{}|{}", language, messages[1].content),
                "tagging",
            ))
        }

        async fn stream(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
            let full = self.invoke(messages).await?;
            let chunks: Vec<Result<ChatCompletion>> = full
                .content
                .chars()
                .map(|c| Ok(ChatCompletion::new(c.to_string(), "tagging")))
                .collect();
            Ok(stream::iter(chunks).boxed())
        }
    }

    /// Rejects every call as if the provider refused the credential
    #[derive(Debug, Default)]
    pub(crate) struct RejectingModel;

    #[async_trait]
    impl ChatModel for RejectingModel {
        fn model_name(&self) -> &str {
            "rejecting"
        }

        async fn invoke(&self, _messages: &[ChatMessage]) -> Result<ChatCompletion> {
            Err(TranslationError::AuthenticationError {
                message: "bad key".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_echo_returns_last_user_message() {
        let messages = vec![
            ChatMessage::system("translate the following into French:"),
            ChatMessage::user("Hello"),
        ];
        let completion = EchoChatModel.invoke(&messages).await.unwrap();
        assert_eq!(completion.content, "Hello");
        assert_eq!(completion.model, "echo");
    }

    #[tokio::test]
    async fn test_default_stream_is_single_chunk() {
        let messages = vec![ChatMessage::user("Hola")];
        let chunks: Vec<ChatCompletion> = EchoChatModel
            .stream(&messages)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hola");
    }
}
