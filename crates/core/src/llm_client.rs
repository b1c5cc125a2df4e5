use anyhow::{Context, Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionTool, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::TokenProvider;

/// Represents a tool call requested by the LLM.
pub type ToolCall = async_openai::types::ChatCompletionMessageToolCall;

/// Represents the two possible outcomes of one LLM turn.
#[derive(Debug, Clone)]
pub enum LLMAction {
    /// The LLM decided to respond directly with text.
    TextResponse(String),
    /// The LLM decided to call one or more tools.
    ToolCall(Vec<ToolCall>),
}

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming call to the LLM to decide on the next action.
    async fn decide_action(
        &self,
        history: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMAction>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
///
/// Gemini is reached through its OpenAI-compatible endpoint, so the same
/// client covers both the API-key and the managed-cloud deployments. The
/// managed-cloud one authenticates with a short-lived token, fetched anew
/// for every request.
pub struct OpenAICompatibleClient {
    config: OpenAIConfig,
    client: Client<OpenAIConfig>,
    tokens: Option<Arc<dyn TokenProvider>>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions.
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config.clone()),
            config,
            tokens: None,
            model,
        }
    }

    /// Sends a token from `tokens` as the API key instead of the configured one.
    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    async fn client(&self) -> Result<Client<OpenAIConfig>> {
        match &self.tokens {
            Some(tokens) => {
                let token = tokens
                    .access_token()
                    .await
                    .context("Failed to obtain an access token for the chat API")?;
                Ok(Client::with_config(self.config.clone().with_api_key(token)))
            }
            None => Ok(self.client.clone()),
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn decide_action(
        &self,
        history: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMAction> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.model).messages(history);
        if !tools.is_empty() {
            request.tools(tools).tool_choice("auto");
        }
        let request = request.build()?;

        let client = self.client().await?;
        let response: CreateChatCompletionResponse = client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .context("No response choice from LLM")?;

        match (&choice.message.tool_calls, &choice.message.content) {
            (Some(tool_calls), _) if !tool_calls.is_empty() => {
                Ok(LLMAction::ToolCall(tool_calls.clone()))
            }
            (_, Some(content)) => Ok(LLMAction::TextResponse(content.clone())),
            _ => Err(anyhow!(
                "LLM response had neither text content nor tool calls."
            )),
        }
    }
}
