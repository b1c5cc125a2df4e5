//! Tool Registry
//!
//! This module holds the callable tools a model may invoke by name. Every tool
//! is registered as either a blocking [`SyncTool`] or an [`AsyncTool`]; the
//! choice is made once, at registration time, and decides how [`ToolRegistry::invoke`]
//! schedules it.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Arguments passed to a tool, as decoded from the model's function call.
pub type ToolArgs = Map<String, Value>;

/// Errors raised while resolving or running a tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),
    #[error("Tool execution failed: {0}")]
    Execution(String),
    #[error("Tool task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A blocking tool. Invocations run on Tokio's blocking pool.
pub trait SyncTool: Send + Sync + 'static {
    fn call(&self, args: ToolArgs) -> Result<Value, ToolError>;
}

impl<F> SyncTool for F
where
    F: Fn(ToolArgs) -> Result<Value, ToolError> + Send + Sync + 'static,
{
    fn call(&self, args: ToolArgs) -> Result<Value, ToolError> {
        self(args)
    }
}

/// A tool that is already asynchronous. Invocations are awaited in place.
#[async_trait]
pub trait AsyncTool: Send + Sync + 'static {
    async fn call(&self, args: ToolArgs) -> Result<Value, ToolError>;
}

/// A registered callable, tagged with how it must be scheduled.
#[derive(Clone)]
pub enum Tool {
    Sync(Arc<dyn SyncTool>),
    Async(Arc<dyn AsyncTool>),
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Sync(_) => write!(f, "Tool::Sync"),
            Tool::Async(_) => write!(f, "Tool::Async"),
        }
    }
}

impl Tool {
    /// Wraps a blocking closure.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(ToolArgs) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        Tool::Sync(Arc::new(f))
    }

    /// Wraps a typed blocking function. Arguments are deserialized into `A`
    /// and the returned value is serialized back to JSON.
    pub fn typed<A, R, F>(f: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Tool::sync(move |args: ToolArgs| {
            let parsed: A = serde_json::from_value(Value::Object(args))?;
            Ok(serde_json::to_value(f(parsed))?)
        })
    }
}

/// The declaration of a tool as advertised to a model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

impl ToolSpec {
    /// Builds a declaration whose parameter schema is derived from `A`.
    pub fn for_args<A: JsonSchema>(name: &str, description: &str) -> Self {
        let mut parameters =
            serde_json::to_value(schemars::schema_for!(A)).unwrap_or(Value::Null);
        // Function-declaration schemas reject these meta keys.
        if let Some(obj) = parameters.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

struct Entry {
    spec: ToolSpec,
    tool: Tool,
}

/// A name-to-tool mapping, built once at startup and shared read-only.
#[derive(Default)]
pub struct ToolRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under `spec.name`, replacing any previous entry.
    pub fn register(&mut self, spec: ToolSpec, tool: Tool) -> &mut Self {
        self.entries
            .insert(spec.name.clone(), Entry { spec, tool });
        self
    }

    /// Looks a tool up by name. Empty names never resolve.
    pub fn resolve(&self, name: &str) -> Option<Tool> {
        if name.is_empty() {
            return None;
        }
        self.entries.get(name).map(|e| e.tool.clone())
    }

    /// Runs a tool. Sync tools are moved off the async workers so they cannot
    /// stall other tasks; async tools are awaited directly.
    pub async fn invoke(tool: &Tool, args: ToolArgs) -> Result<Value, ToolError> {
        match tool {
            Tool::Sync(f) => {
                let f = Arc::clone(f);
                tokio::task::spawn_blocking(move || f.call(args)).await?
            }
            Tool::Async(f) => f.call(args).await,
        }
    }

    /// Resolves and runs a tool in one step.
    pub async fn call(&self, name: &str, args: ToolArgs) -> Result<Value, ToolError> {
        let tool = self
            .resolve(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        Self::invoke(&tool, args).await
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.entries.values().map(|e| &e.spec)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
