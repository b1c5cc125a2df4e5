//! Aerodesk Core
//!
//! Domain logic shared by the relay service: the tool registry and the mock
//! airline tools it exposes, the text chat agent with its session store, and
//! the cloud credentials both models authenticate with.

pub mod agent;
pub mod airline;
pub mod auth;
pub mod llm_client;
pub mod session;
pub mod tools;

/// Application name under which chat sessions are stored.
pub const APP_NAME: &str = "turkish_airlines_app";
