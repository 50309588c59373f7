//! Sequential stage pipeline
//!
//! A [`Chain`] is an ordered list of named [`Stage`]s. Each stage maps one
//! [`ChainValue`] to the next; the chain runs them in order for `invoke`,
//! concurrently over independent inputs for `batch`, and threads a stream of
//! chunks through every stage for `stream`.

use async_trait::async_trait;
use futures::future::{self, try_join_all};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::core::errors::{Result, TranslationError};
use crate::core::llm::ChatModel;
use crate::core::models::{ChatCompletion, ChatMessage, TranslationInput};
use crate::core::parser::StrOutputParser;
use crate::core::prompt::ChatPromptTemplate;

/// Value passed between stages
#[derive(Debug, Clone, PartialEq)]
pub enum ChainValue {
    /// Named template inputs
    Variables(HashMap<String, String>),
    /// Rendered prompt
    Messages(Vec<ChatMessage>),
    /// Model output
    Completion(ChatCompletion),
    /// Parsed text
    Text(String),
}

impl ChainValue {
    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ChainValue::Variables(_) => "variables",
            ChainValue::Messages(_) => "messages",
            ChainValue::Completion(_) => "completion",
            ChainValue::Text(_) => "text",
        }
    }

    /// Final text output of a chain
    pub fn into_text(self) -> Result<String> {
        match self {
            ChainValue::Text(text) => Ok(text),
            other => Err(TranslationError::StageInput {
                stage: "output".to_string(),
                expected: "text",
                found: other.kind(),
            }),
        }
    }

    /// Combine streamed chunks back into one value
    ///
    /// Text chunks concatenate and completion chunks merge; anything else must
    /// arrive as a single chunk.
    pub fn aggregate(chunks: Vec<ChainValue>, stage: &str) -> Result<ChainValue> {
        let mut chunks = chunks.into_iter();
        let mut acc = chunks.next().ok_or_else(|| TranslationError::StageInput {
            stage: stage.to_string(),
            expected: "at least one value",
            found: "empty stream",
        })?;

        for chunk in chunks {
            match (&mut acc, chunk) {
                (ChainValue::Text(acc), ChainValue::Text(next)) => acc.push_str(&next),
                (ChainValue::Completion(acc), ChainValue::Completion(next)) => acc.merge(next),
                (acc, next) => {
                    return Err(TranslationError::StageInput {
                        stage: stage.to_string(),
                        expected: acc.kind(),
                        found: next.kind(),
                    })
                }
            }
        }

        Ok(acc)
    }
}

/// Boxed stream of chain values
pub type ValueStream = BoxStream<'static, Result<ChainValue>>;

/// One named step of a chain
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Stage name for logs and errors
    fn name(&self) -> &str;

    /// Map a whole input value to an output value
    async fn run(&self, input: ChainValue) -> Result<ChainValue>;

    /// Map a stream of input chunks to a stream of output chunks
    ///
    /// The default buffers the whole input and emits the single result of `run`.
    fn transform(self: Arc<Self>, upstream: ValueStream) -> ValueStream {
        Box::pin(stream::once(async move {
            let chunks: Vec<ChainValue> = upstream.try_collect().await?;
            let input = ChainValue::aggregate(chunks, self.name())?;
            self.run(input).await
        }))
    }
}

fn unexpected(stage: &str, expected: &'static str, found: &ChainValue) -> TranslationError {
    TranslationError::StageInput {
        stage: stage.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Renders template variables into chat messages
pub struct PromptStage {
    prompt: ChatPromptTemplate,
}

impl PromptStage {
    pub fn new(prompt: ChatPromptTemplate) -> Self {
        Self { prompt }
    }
}

#[async_trait]
impl Stage for PromptStage {
    fn name(&self) -> &str {
        "prompt"
    }

    async fn run(&self, input: ChainValue) -> Result<ChainValue> {
        match input {
            ChainValue::Variables(vars) => Ok(ChainValue::Messages(self.prompt.format_messages(&vars)?)),
            other => Err(unexpected(self.name(), "variables", &other)),
        }
    }
}

/// Sends chat messages to a model
pub struct ModelStage {
    model: Arc<dyn ChatModel>,
}

impl ModelStage {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    fn messages(&self, input: ChainValue) -> Result<Vec<ChatMessage>> {
        match input {
            ChainValue::Messages(messages) => Ok(messages),
            other => Err(unexpected(self.name(), "messages", &other)),
        }
    }
}

#[async_trait]
impl Stage for ModelStage {
    fn name(&self) -> &str {
        "model"
    }

    async fn run(&self, input: ChainValue) -> Result<ChainValue> {
        let messages = self.messages(input)?;
        let completion = self.model.invoke(&messages).await?;
        debug!(
            "Model {} finished: {:?}",
            completion.model, completion.finish_reason
        );
        Ok(ChainValue::Completion(completion))
    }

    fn transform(self: Arc<Self>, upstream: ValueStream) -> ValueStream {
        let completions = async move {
            let chunks: Vec<ChainValue> = upstream.try_collect().await?;
            let messages = self.messages(ChainValue::aggregate(chunks, self.name())?)?;
            let stream = self.model.stream(&messages).await?;
            Ok::<ValueStream, TranslationError>(stream.map_ok(ChainValue::Completion).boxed())
        };
        stream::once(completions).try_flatten().boxed()
    }
}

/// Reduces completions to their text
pub struct ParserStage {
    parser: StrOutputParser,
}

impl ParserStage {
    pub fn new(parser: StrOutputParser) -> Self {
        Self { parser }
    }

    fn parse(&self, input: ChainValue) -> Result<ChainValue> {
        match input {
            ChainValue::Completion(completion) => Ok(ChainValue::Text(self.parser.parse(completion))),
            ChainValue::Text(text) => Ok(ChainValue::Text(text)),
            other => Err(unexpected(self.name(), "completion", &other)),
        }
    }
}

#[async_trait]
impl Stage for ParserStage {
    fn name(&self) -> &str {
        "parser"
    }

    async fn run(&self, input: ChainValue) -> Result<ChainValue> {
        self.parse(input)
    }

    fn transform(self: Arc<Self>, upstream: ValueStream) -> ValueStream {
        upstream
            .map(move |chunk| chunk.and_then(|value| self.parse(value)))
            .boxed()
    }
}

/// Ordered stages run one after another
#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<Arc<dyn Stage>>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn then<S: Stage>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order on one input
    pub async fn invoke(&self, input: ChainValue) -> Result<ChainValue> {
        let mut value = input;
        for stage in &self.stages {
            debug!("Running stage '{}' on {}", stage.name(), value.kind());
            value = stage.run(value).await?;
        }
        Ok(value)
    }

    /// Invoke on independent inputs concurrently; outputs keep input order
    pub async fn batch(&self, inputs: Vec<ChainValue>) -> Result<Vec<ChainValue>> {
        try_join_all(inputs.into_iter().map(|input| self.invoke(input))).await
    }

    /// Stream chunks through every stage's `transform`
    pub fn stream(&self, input: ChainValue) -> ValueStream {
        let mut chunks: ValueStream = Box::pin(stream::once(future::ready(Ok(input))));
        for stage in &self.stages {
            chunks = Arc::clone(stage).transform(chunks);
        }
        chunks
    }
}

/// The prompt → model → parser translation pipeline
#[derive(Clone)]
pub struct TranslationChain {
    chain: Chain,
    model_name: String,
}

impl fmt::Debug for TranslationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationChain")
            .field("chain", &self.chain)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl TranslationChain {
    pub fn new(prompt: ChatPromptTemplate, model: Arc<dyn ChatModel>) -> Self {
        let model_name = model.model_name().to_string();
        let chain = Chain::new()
            .then(PromptStage::new(prompt))
            .then(ModelStage::new(model))
            .then(ParserStage::new(StrOutputParser));

        Self { chain, model_name }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Translate one input
    pub async fn translate(&self, input: &TranslationInput) -> Result<String> {
        self.chain
            .invoke(ChainValue::Variables(input.to_variables()))
            .await?
            .into_text()
    }

    /// Translate several inputs concurrently
    pub async fn translate_batch(&self, inputs: &[TranslationInput]) -> Result<Vec<String>> {
        let values = inputs
            .iter()
            .map(|input| ChainValue::Variables(input.to_variables()))
            .collect();

        self.chain
            .batch(values)
            .await?
            .into_iter()
            .map(ChainValue::into_text)
            .collect()
    }

    /// Translate one input as a stream of text chunks
    pub fn translate_stream(&self, input: &TranslationInput) -> BoxStream<'static, Result<String>> {
        self.chain
            .stream(ChainValue::Variables(input.to_variables()))
            .map(|chunk| chunk.and_then(ChainValue::into_text))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DEFAULT_SYSTEM_TEMPLATE;
    use crate::core::llm::testing::TaggingModel;
    use crate::core::llm::EchoChatModel;
    use crate::core::models::Role;
    use tokio_test::{assert_err, assert_ok};

    fn translation_chain(model: Arc<dyn ChatModel>) -> TranslationChain {
        let prompt = ChatPromptTemplate::translation(DEFAULT_SYSTEM_TEMPLATE).unwrap();
        TranslationChain::new(prompt, model)
    }

    #[tokio::test]
    async fn test_echo_pipeline_returns_user_text() {
        let chain = translation_chain(Arc::new(EchoChatModel));
        let output = chain
            .translate(&TranslationInput::new("Hello", "French"))
            .await
            .unwrap();
        assert_eq!(output, "Hello");
        assert_eq!(chain.chain().stage_names(), ["prompt", "model", "parser"]);
    }

    #[tokio::test]
    async fn test_empty_text_still_reaches_model() {
        let model = Arc::new(TaggingModel::default());
        let chain = translation_chain(model.clone());

        let output = assert_ok!(chain.translate(&TranslationInput::new("", "French")).await);
        assert_eq!(output, "French|");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let chain = translation_chain(Arc::new(TaggingModel::default()));
        let inputs = vec![
            TranslationInput::new("one", "French"),
            TranslationInput::new("two", "German"),
            TranslationInput::new("three", "Spanish"),
        ];

        let outputs = chain.translate_batch(&inputs).await.unwrap();
        assert_eq!(outputs, ["French|one", "German|two", "Spanish|three"]);
    }

    #[tokio::test]
    async fn test_stream_chunks_concatenate_to_invoke_output() {
        let chain = translation_chain(Arc::new(TaggingModel::default()));
        let input = TranslationInput::new("Hello", "Italian");

        let chunks: Vec<String> = chain.translate_stream(&input).try_collect().await.unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), chain.translate(&input).await.unwrap());
    }

    #[tokio::test]
    async fn test_stage_rejects_wrong_value() {
        let chain = Chain::new().then(ParserStage::new(StrOutputParser));
        let err = assert_err!(
            chain
                .invoke(ChainValue::Messages(vec![ChatMessage::new(Role::User, "x")]))
                .await
        );
        assert!(matches!(
            err,
            TranslationError::StageInput { expected: "completion", found: "messages", .. }
        ));
    }

    #[test]
    fn test_aggregate() {
        let text = ChainValue::aggregate(
            vec![ChainValue::Text("Bon".into()), ChainValue::Text("jour".into())],
            "test",
        )
        .unwrap();
        assert_eq!(text, ChainValue::Text("Bonjour".into()));

        assert!(ChainValue::aggregate(vec![], "test").is_err());
        assert!(ChainValue::aggregate(
            vec![ChainValue::Text("a".into()), ChainValue::Messages(vec![])],
            "test"
        )
        .is_err());
    }
}
