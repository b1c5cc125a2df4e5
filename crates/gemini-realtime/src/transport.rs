//! Transport abstraction for a live model connection.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// The outcome of one receive on a [`ModelSource`].
#[derive(Debug)]
pub enum Received {
    /// A raw server frame, exactly as it came off the wire.
    Frame(Bytes),
    /// The remote side closed the connection normally.
    Closed,
    /// The connection failed. `TransportError::ConnectionClosed` marks an
    /// unexpected drop.
    Error(TransportError),
}

/// The write half of a model connection. Implementations serialize
/// concurrent writers, so it may be shared freely.
#[async_trait]
pub trait ModelSink: Send + Sync {
    /// Sends one text message as-is.
    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Starts a normal close. Errors are ignored; the connection may
    /// already be gone.
    async fn close(&self);
}

/// The read half of a model connection.
#[async_trait]
pub trait ModelSource: Send {
    async fn recv(&mut self) -> Received;
}

/// An established model connection, split into its two halves.
pub struct ModelConnection {
    pub sink: Arc<dyn ModelSink>,
    pub source: Box<dyn ModelSource>,
}

/// Opens model connections. One connector serves every client session.
#[async_trait]
pub trait ModelConnector: Send + Sync {
    async fn connect(&self) -> Result<ModelConnection, TransportError>;
}
