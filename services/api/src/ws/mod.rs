//! Voice Relay over WebSockets
//!
//! Bridges a browser connection to the live model:
//!
//! - `protocol`: client envelopes, status notices and the tool-call wire format.
//! - `session`: the websocket handler and the two relay pumps.
//! - `dispatch`: runs model-requested tools without blocking the relay.
//! - `supervisor`: reconnects with backoff when the model drops the connection.

pub mod dispatch;
pub mod protocol;
pub mod session;
pub mod supervisor;

pub use session::ws_handler;

use gemini_realtime::TransportError;

/// Why a relay session ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Client connection error: {0}")]
    Client(#[from] axum::Error),
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
