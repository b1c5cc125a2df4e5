//! Gemini Live transport.
//!
//! A thin client for the bidirectional `BidiGenerateContent` websocket. It
//! performs the setup handshake and then exposes the connection as a pair of
//! halves: a [`ModelSink`] that many tasks may write to, and a
//! [`ModelSource`] that yields raw server frames untouched.

pub mod config;
pub mod error;
pub mod live;
pub mod transport;

pub use config::{Endpoint, FunctionDeclaration, LiveConnectConfig};
pub use error::TransportError;
pub use live::LiveConnector;
pub use transport::{ModelConnection, ModelConnector, ModelSink, ModelSource, Received};
