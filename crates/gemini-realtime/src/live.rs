//! Websocket implementation of the model transport.

use crate::{
    config::{Endpoint, LiveConnectConfig},
    error::TransportError,
    transport::{ModelConnection, ModelConnector, ModelSink, ModelSource, Received},
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::{CloseFrame, Message as WsMessage, frame::coding::CloseCode},
    },
};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the Gemini Live endpoint and completes the setup handshake.
pub struct LiveConnector {
    endpoint: Endpoint,
    config: LiveConnectConfig,
    url_override: Option<String>,
    setup_timeout: Duration,
}

impl LiveConnector {
    pub fn new(endpoint: Endpoint, config: LiveConnectConfig) -> Self {
        Self {
            endpoint,
            config,
            url_override: None,
            setup_timeout: Duration::from_secs(30),
        }
    }

    /// Dials `url` instead of the endpoint's default, e.g. through a proxy.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url_override = Some(url.into());
        self
    }

    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    fn url(&self) -> String {
        self.url_override
            .clone()
            .unwrap_or_else(|| self.endpoint.url())
    }
}

#[async_trait]
impl ModelConnector for LiveConnector {
    async fn connect(&self) -> Result<ModelConnection, TransportError> {
        let setup = self.config.setup_message(&self.endpoint)?;

        let mut request = self.url().into_client_request()?;
        if let Some(token) = self.endpoint.bearer_token().await? {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut tx, rx) = ws_stream.split();

        tx.send(WsMessage::Text(setup.into()))
            .await
            .map_err(TransportError::from_ws)?;

        let mut source = LiveSource { stream: rx };
        tokio::time::timeout(self.setup_timeout, source.wait_for_setup_complete())
            .await
            .map_err(|_| TransportError::Connect("timed out waiting for setupComplete".into()))??;
        info!(model = %self.config.model, "Live model session is set up.");

        Ok(ModelConnection {
            sink: Arc::new(LiveSink {
                sink: Mutex::new(tx),
            }),
            source: Box::new(source),
        })
    }
}

/// Write half. The mutex serializes the relay pump and tool dispatchers.
struct LiveSink {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
}

#[async_trait]
impl ModelSink for LiveSink {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(TransportError::from_ws)
    }

    async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            debug!(error = %e, "Ignoring error while closing model connection");
        }
    }
}

struct LiveSource {
    stream: SplitStream<WsStream>,
}

impl LiveSource {
    async fn wait_for_setup_complete(&mut self) -> Result<(), TransportError> {
        loop {
            match self.recv().await {
                Received::Frame(frame) => {
                    if is_setup_complete(&frame) {
                        return Ok(());
                    }
                    warn!("Ignoring frame received before setupComplete");
                }
                Received::Closed => {
                    return Err(TransportError::closed("closed during setup"));
                }
                Received::Error(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ModelSource for LiveSource {
    async fn recv(&mut self) -> Received {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Binary(data))) => return Received::Frame(data),
                Some(Ok(WsMessage::Text(text))) => {
                    return Received::Frame(Bytes::copy_from_slice(text.as_bytes()));
                }
                Some(Ok(WsMessage::Close(frame))) => return classify_close(frame),
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed)) => return Received::Closed,
                Some(Err(e)) => return Received::Error(TransportError::from_ws(e)),
                None => {
                    return Received::Error(TransportError::closed(
                        "stream ended without a close frame",
                    ));
                }
            }
        }
    }
}

fn is_setup_complete(frame: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(frame)
        .map(|v| v.get("setupComplete").is_some())
        .unwrap_or(false)
}

/// Normal and going-away closes end the stream; any other code is an
/// unexpected drop.
fn classify_close(frame: Option<CloseFrame>) -> Received {
    match frame {
        None => Received::Closed,
        Some(frame) if matches!(frame.code, CloseCode::Normal | CloseCode::Away) => {
            Received::Closed
        }
        Some(frame) => Received::Error(TransportError::ConnectionClosed {
            code: Some(u16::from(frame.code)),
            reason: frame.reason.as_str().to_string(),
        }),
    }
}
