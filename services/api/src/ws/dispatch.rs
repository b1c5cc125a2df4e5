//! Executes model-requested function calls off the relay loop.

use super::protocol::{FunctionCall, ToolResponseEnvelope};
use aerodesk_core::tools::ToolRegistry;
use gemini_realtime::ModelSink;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, warn};

#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    sink: Arc<dyn ModelSink>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, sink: Arc<dyn ModelSink>) -> Self {
        Self { registry, sink }
    }

    /// Spawns one task per call into `tasks`. Responses go back in whatever
    /// order the tools finish.
    pub fn dispatch(&self, calls: Vec<FunctionCall>, tasks: &mut JoinSet<()>) {
        if calls.is_empty() {
            debug!("No function calls in tool_call");
        }
        for call in calls {
            let dispatcher = self.clone();
            tasks.spawn(async move { dispatcher.handle(call).await }.in_current_span());
        }
    }

    /// Runs a single call and sends its response. Unknown tools are logged
    /// and get no response.
    pub async fn handle(&self, call: FunctionCall) {
        let name = call.name.unwrap_or_default();
        debug!(tool = %name, args = ?call.args, "Calling tool function");

        let Some(tool) = self.registry.resolve(&name) else {
            error!(tool = %name, "Function {name} not found");
            return;
        };

        let response = match ToolRegistry::invoke(&tool, call.args.unwrap_or_default()).await {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(other) => json!({ "result": other }),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                json!({ "error": e.to_string() })
            }
        };

        let envelope = ToolResponseEnvelope::single(call.id, name, response);
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Failed to encode tool response");
                return;
            }
        };
        debug!(response = %text, "Tool response");
        if let Err(e) = self.sink.send_text(text).await {
            warn!(error = %e, "Failed to send tool response to model");
        }
    }
}
