//! Fakes shared by the unit tests of this crate.

use crate::{
    config::{Config, ModelBackend},
    state::AppState,
    ws::session::{ClientSink, ClientStream, SessionContext, SharedClientSink},
};
use aerodesk_core::{
    agent::{AgentEvent, ChatAgent},
    session::{ChatSession, InMemorySessionStore},
    tools::ToolRegistry,
};
use async_trait::async_trait;
use axum::extract::ws::Message;
use futures::{SinkExt, StreamExt, channel::mpsc as fmpsc};
use gemini_realtime::{
    ModelConnection, ModelConnector, ModelSink, ModelSource, Received, TransportError,
};
use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tokio::sync::{Mutex, mpsc};
use tracing_subscriber::fmt::MakeWriter;

/// Records everything written to the model side.
pub struct FakeSink {
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl ModelSink for FakeSink {
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.sent.send(text).map_err(|_| TransportError::ConnectionClosed {
            code: None,
            reason: "fake sink receiver dropped".into(),
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Replays whatever the test pushes; a dropped sender reads as a normal close.
pub struct FakeSource {
    frames: mpsc::UnboundedReceiver<Received>,
}

#[async_trait]
impl ModelSource for FakeSource {
    async fn recv(&mut self) -> Received {
        self.frames.recv().await.unwrap_or(Received::Closed)
    }
}

/// The test's end of a fake model connection.
pub struct ModelHandle {
    pub frames: mpsc::UnboundedSender<Received>,
    pub sent: mpsc::UnboundedReceiver<String>,
    pub closed: Arc<AtomicBool>,
}

pub fn fake_connection() -> (ModelConnection, ModelHandle) {
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let connection = ModelConnection {
        sink: Arc::new(FakeSink {
            sent: sent_tx,
            closed: closed.clone(),
        }),
        source: Box::new(FakeSource { frames: frames_rx }),
    };
    (
        connection,
        ModelHandle {
            frames: frames_tx,
            sent: sent_rx,
            closed,
        },
    )
}

pub fn dropped(reason: &str) -> TransportError {
    TransportError::ConnectionClosed {
        code: Some(1011),
        reason: reason.to_string(),
    }
}

/// Hands out scripted connection results in order.
#[derive(Default)]
pub struct ScriptedConnector {
    script: StdMutex<VecDeque<Result<ModelConnection, TransportError>>>,
    pub attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Result<ModelConnection, TransportError>>) -> Self {
        Self {
            script: StdMutex::new(script.into()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelConnector for ScriptedConnector {
    async fn connect(&self) -> Result<ModelConnection, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(TransportError::Connect("script exhausted".into())))
    }
}

/// Both halves of a fake browser connection plus the test's ends of them.
pub struct FakeClient {
    pub tx: SharedClientSink,
    pub rx: ClientStream,
    /// Pushes messages as if the browser sent them.
    pub inbound: fmpsc::UnboundedSender<Result<Message, axum::Error>>,
    /// Everything the server wrote to the browser.
    pub outbound: fmpsc::UnboundedReceiver<Message>,
}

pub fn fake_client() -> FakeClient {
    let (out_tx, out_rx) = fmpsc::unbounded::<Message>();
    let (in_tx, in_rx) = fmpsc::unbounded::<Result<Message, axum::Error>>();
    let sink: ClientSink = Box::pin(out_tx.sink_map_err(axum::Error::new));
    let stream: ClientStream = Box::pin(in_rx);
    FakeClient {
        tx: Arc::new(Mutex::new(sink)),
        rx: stream,
        inbound: in_tx,
        outbound: out_rx,
    }
}

pub fn new_context() -> Arc<Mutex<SessionContext>> {
    Arc::new(Mutex::new(SessionContext::default()))
}

pub fn text(raw: &str) -> Result<Message, axum::Error> {
    Ok(Message::Text(raw.to_string().into()))
}

/// Waits for the next text message written to the fake browser.
pub async fn next_text(outbound: &mut fmpsc::UnboundedReceiver<Message>) -> String {
    match outbound.next().await {
        Some(Message::Text(t)) => t.as_str().to_owned(),
        other => panic!("expected a text message, got {other:?}"),
    }
}

/// Collects the messages already written to the fake browser.
pub fn drain_outbound(client: &mut FakeClient) -> Vec<Message> {
    let mut messages = Vec::new();
    while let Ok(Some(message)) = client.outbound.try_next() {
        messages.push(message);
    }
    messages
}

pub fn status_texts(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Text(t) => serde_json::from_str::<serde_json::Value>(t.as_str())
                .ok()
                .and_then(|v| v["status"].as_str().map(str::to_string)),
            _ => None,
        })
        .collect()
}

/// A chat agent that replays canned events, or fails when given none.
pub struct CannedAgent {
    pub events: Option<Vec<AgentEvent>>,
}

#[async_trait]
impl ChatAgent for CannedAgent {
    async fn run(&self, _session: &ChatSession, _message: &str) -> anyhow::Result<Vec<AgentEvent>> {
        self.events
            .clone()
            .ok_or_else(|| anyhow::anyhow!("model unavailable"))
    }
}

pub fn test_config(frontend_build_dir: PathBuf) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        backend: ModelBackend::ApiKey {
            api_key: "test".into(),
        },
        live_model: "live".into(),
        chat_model: "chat".into(),
        voice_name: "Kore".into(),
        rag_corpus: None,
        log_level: tracing::Level::DEBUG,
        prompts_path: PathBuf::from("./prompts"),
        frontend_build_dir,
    }
}

pub fn test_state(agent: CannedAgent, frontend_build_dir: PathBuf) -> Arc<AppState> {
    Arc::new(AppState {
        config: Arc::new(test_config(frontend_build_dir)),
        tools: Arc::new(ToolRegistry::new()),
        connector: Arc::new(ScriptedConnector::default()),
        chat_agent: Arc::new(agent),
        chat_sessions: Arc::new(InMemorySessionStore::new(aerodesk_core::APP_NAME)),
    })
}

/// A unique scratch directory under the system temp dir.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("aerodesk-{label}-{}", rand::random::<u64>()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Formatted log output of the current thread, for asserting on records.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<StdMutex<Vec<u8>>>);

impl CapturedLogs {
    /// Routes this thread's tracing events here until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
