//! Shared Application State
//!
//! This module defines the `AppState` struct, built once at startup and
//! handed to every handler. Nothing in the service is global.

use crate::config::Config;
use aerodesk_core::{agent::ChatAgent, session::InMemorySessionStore, tools::ToolRegistry};
use gemini_realtime::ModelConnector;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Tools the live model may call. The chat agent holds its own handle.
    pub tools: Arc<ToolRegistry>,
    /// Opens one live model connection per voice session attempt.
    pub connector: Arc<dyn ModelConnector>,
    pub chat_agent: Arc<dyn ChatAgent>,
    pub chat_sessions: Arc<InMemorySessionStore>,
}
