//! Text Chat Agent
//!
//! The synchronous support agent behind the chat endpoint. A turn runs a
//! Reason-Act loop: the model either answers with text or asks for tools,
//! the tools run against the shared [`ToolRegistry`], and their results are
//! fed back until a final answer appears or the round budget runs out.

use crate::{
    llm_client::{LLMAction, LLMClient},
    session::ChatSession,
    tools::{ToolArgs, ToolRegistry, ToolSpec},
};
use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
    FunctionObjectArgs,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Text returned to callers when a turn produced no final message.
pub const NO_RESPONSE_TEXT: &str = "No response from agent";

/// Something that happened while the agent handled a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    ToolCall { name: String, args: Value },
    ToolResult { name: String, response: Value },
    Message { text: String, is_final: bool },
}

impl AgentEvent {
    pub fn is_final_response(&self) -> bool {
        matches!(self, AgentEvent::Message { is_final: true, .. })
    }
}

/// Concatenates the text of every final message, or returns
/// [`NO_RESPONSE_TEXT`] when there is none.
pub fn final_response_text(events: &[AgentEvent]) -> String {
    let text: String = events
        .iter()
        .filter_map(|event| match event {
            AgentEvent::Message {
                text,
                is_final: true,
            } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    if text.is_empty() {
        NO_RESPONSE_TEXT.to_string()
    } else {
        text
    }
}

/// An agent that answers one user message within a session.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn run(&self, session: &ChatSession, message: &str) -> Result<Vec<AgentEvent>>;
}

/// A [`ChatAgent`] that lets an LLM call registry tools before answering.
pub struct ToolCallingAgent {
    llm: Arc<dyn LLMClient>,
    instruction: String,
    tools: Arc<ToolRegistry>,
    max_rounds: usize,
}

impl ToolCallingAgent {
    pub const DEFAULT_MAX_ROUNDS: usize = 8;

    pub fn new(llm: Arc<dyn LLMClient>, instruction: String, tools: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            instruction,
            tools,
            max_rounds: Self::DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    fn tool_definitions(&self) -> Result<Vec<ChatCompletionTool>> {
        self.tools
            .specs()
            .map(|spec: &ToolSpec| {
                Ok(ChatCompletionToolArgs::default()
                    .function(
                        FunctionObjectArgs::default()
                            .name(spec.name.clone())
                            .description(spec.description.clone())
                            .parameters(spec.parameters.clone())
                            .build()?,
                    )
                    .build()?)
            })
            .collect()
    }

    /// Runs a tool and returns its output as a JSON object. Failures become
    /// an `{"error": ...}` object so the model can recover.
    async fn execute(&self, name: &str, raw_arguments: &str) -> (Value, Value) {
        let args: ToolArgs = match serde_json::from_str::<Value>(raw_arguments) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => ToolArgs::new(),
            Ok(other) => {
                let err = json!({ "error": format!("Arguments must be an object, got {other}") });
                return (Value::Null, err);
            }
            Err(e) => {
                let err = json!({ "error": format!("Malformed arguments: {e}") });
                return (Value::Null, err);
            }
        };
        let args_value = Value::Object(args.clone());
        let response = match self.tools.call(name, args).await {
            Ok(value @ Value::Object(_)) => value,
            Ok(value) => json!({ "result": value }),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                json!({ "error": e.to_string() })
            }
        };
        (args_value, response)
    }
}

#[async_trait]
impl ChatAgent for ToolCallingAgent {
    async fn run(&self, session: &ChatSession, message: &str) -> Result<Vec<AgentEvent>> {
        let mut history = session.history.lock().await;
        // Work on a copy so a failed turn leaves the stored history untouched.
        let mut turn = history.clone();
        if turn.is_empty() && !self.instruction.is_empty() {
            turn.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(self.instruction.clone())
                    .build()?
                    .into(),
            );
        }
        turn.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message.to_string())
                .build()?
                .into(),
        );

        let tools = self.tool_definitions()?;
        let mut events = Vec::new();

        for round in 0..self.max_rounds {
            match self.llm.decide_action(turn.clone(), tools.clone()).await? {
                LLMAction::TextResponse(text) => {
                    turn.push(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(text.clone())
                            .build()?
                            .into(),
                    );
                    events.push(AgentEvent::Message {
                        text,
                        is_final: true,
                    });
                    *history = turn;
                    return Ok(events);
                }
                LLMAction::ToolCall(tool_calls) => {
                    debug!(round, count = tool_calls.len(), "Model requested tools");
                    turn.push(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .tool_calls(tool_calls.clone())
                            .build()?
                            .into(),
                    );
                    for call in &tool_calls {
                        let name = call.function.name.as_str();
                        info!(user_id = %session.user_id, tool = %name, "Executing tool");
                        let (args, response) = self.execute(name, &call.function.arguments).await;
                        events.push(AgentEvent::ToolCall {
                            name: name.to_string(),
                            args,
                        });
                        let tool_message: ChatCompletionRequestMessage =
                            ChatCompletionRequestToolMessageArgs::default()
                                .tool_call_id(call.id.clone())
                                .content(response.to_string())
                                .build()?
                                .into();
                        turn.push(tool_message);
                        events.push(AgentEvent::ToolResult {
                            name: name.to_string(),
                            response,
                        });
                    }
                }
            }
        }

        warn!(
            user_id = %session.user_id,
            max_rounds = self.max_rounds,
            "Agent exhausted its tool rounds without a final answer"
        );
        *history = turn;
        Ok(events)
    }
}
