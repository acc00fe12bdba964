//! A thin, swappable client for OpenAI-compatible chat-completion APIs.

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionTool, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Represents a tool call requested by the LLM.
pub type ToolCall = async_openai::types::ChatCompletionMessageToolCall;

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone)]
pub enum LlmStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the LLM.
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<LlmStreamEvent, OpenAIError>> + Send>>;

/// Represents the two possible outcomes of the LLM's initial decision-making turn.
#[derive(Debug, Clone)]
pub enum LlmAction {
    /// The LLM decided to respond directly with text.
    TextResponse(String),
    /// The LLM decided to call one or more tools.
    ToolCall(Vec<ToolCall>),
}

/// Provider failures, split so the orchestrator can surface rate limiting as
/// a distinct, recoverable condition. Neither case is retried automatically;
/// the user is the retry mechanism.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("The provider rate-limited this turn: {0}")]
    RateLimited(String),
    #[error("Model provider error: {0}")]
    Provider(OpenAIError),
    #[error("Model response had neither text content nor tool calls.")]
    EmptyResponse,
}

impl From<OpenAIError> for LlmError {
    fn from(err: OpenAIError) -> Self {
        if let OpenAIError::ApiError(api) = &err {
            let kind = api.r#type.as_deref().unwrap_or_default();
            let message = api.message.to_lowercase();
            if kind.contains("rate_limit")
                || message.contains("rate limit")
                || message.contains("429")
            {
                return LlmError::RateLimited(api.message.clone());
            }
        }
        LlmError::Provider(err)
    }
}

/// A generic client for interacting with an LLM.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Makes a single, non-streaming call to the LLM to decide on the next
    /// action. `tools` may be empty, in which case none are offered.
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LlmAction, LlmError>;

    /// Makes a streaming call to the LLM after tools have been executed.
    async fn stream_after_tools(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LlmStream, LlmError>;
}

/// An implementation of `LlmClient` for any OpenAI-compatible API.
pub struct OpenAiCompatClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompatClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL for the provider endpoint.
    /// * `model` - The model identifier to use for chat completions
    ///   (e.g., "llama-3.3-70b-versatile").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LlmAction, LlmError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages);
        if !tools.is_empty() {
            builder.tools(tools).tool_choice("auto");
        }
        let request = builder.build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        let choice = response.choices.first().ok_or(LlmError::EmptyResponse)?;

        if let Some(tool_calls) = &choice.message.tool_calls {
            if !tool_calls.is_empty() {
                return Ok(LlmAction::ToolCall(tool_calls.clone()));
            }
        }
        if let Some(content) = &choice.message.content {
            Ok(LlmAction::TextResponse(content.clone()))
        } else {
            Err(LlmError::EmptyResponse)
        }
    }

    async fn stream_after_tools(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LlmStream, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async {
            match result {
                Ok(response) => {
                    let choice = response.choices.first()?;
                    if let Some(content) = &choice.delta.content {
                        if !content.is_empty() {
                            return Some(Ok(LlmStreamEvent::TextChunk(content.clone())));
                        }
                    }
                    None
                }
                Err(e) => Some(Err(e)),
            }
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(kind: Option<&str>, message: &str) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: kind.map(str::to_string),
            param: None,
            code: None,
        })
    }

    #[test]
    fn rate_limit_type_is_classified_as_rate_limited() {
        let err = LlmError::from(api_error(Some("rate_limit_exceeded"), "slow down"));
        assert!(matches!(err, LlmError::RateLimited(_)));
    }

    #[test]
    fn rate_limit_message_is_classified_as_rate_limited() {
        let err = LlmError::from(api_error(None, "Rate limit reached for model"));
        assert!(matches!(err, LlmError::RateLimited(_)));
    }

    #[test]
    fn other_api_errors_stay_generic() {
        let err = LlmError::from(api_error(Some("invalid_request_error"), "bad model id"));
        assert!(matches!(err, LlmError::Provider(_)));
    }
}
