use tokio_tungstenite::tungstenite;

/// Errors raised by the model transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote endpoint dropped the connection without a normal close.
    /// This is the only condition callers are expected to retry.
    #[error("Model connection closed unexpectedly (code {code:?}): {reason}")]
    ConnectionClosed { code: Option<u16>, reason: String },
    #[error("Failed to connect to model endpoint: {0}")]
    Connect(String),
    #[error("Failed to obtain credentials: {0}")]
    Auth(String),
    #[error("Invalid endpoint configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

impl TransportError {
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, TransportError::ConnectionClosed { .. })
    }

    pub(crate) fn closed(reason: impl Into<String>) -> Self {
        TransportError::ConnectionClosed {
            code: None,
            reason: reason.into(),
        }
    }

    /// Classifies a websocket error: resets and I/O failures on an open
    /// socket count as an unexpected close.
    pub(crate) fn from_ws(err: tungstenite::Error) -> Self {
        use tungstenite::error::ProtocolError;
        match err {
            tungstenite::Error::Io(e) => TransportError::closed(e.to_string()),
            tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                TransportError::closed("connection reset without closing handshake")
            }
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::closed("connection already closed")
            }
            other => TransportError::WebSocket(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_and_reset_errors_count_as_closed() {
        let io = tungstenite::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(TransportError::from_ws(io).is_connection_closed());

        let reset = tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
        );
        assert!(TransportError::from_ws(reset).is_connection_closed());
    }

    #[test]
    fn test_other_errors_are_not_retryable() {
        let err = TransportError::from_ws(tungstenite::Error::Capacity(
            tungstenite::error::CapacityError::MessageTooLong {
                size: 10,
                max_size: 1,
            },
        ));
        assert!(!err.is_connection_closed());
        assert!(!TransportError::Connect("refused".into()).is_connection_closed());
    }

    #[test]
    fn test_display_includes_code() {
        let err = TransportError::ConnectionClosed {
            code: Some(1011),
            reason: "internal".into(),
        };
        assert_eq!(
            err.to_string(),
            "Model connection closed unexpectedly (code Some(1011)): internal"
        );
    }
}
