//! One relay session: a browser connection bridged to one model connection.

use super::{
    SessionError,
    dispatch::ToolDispatcher,
    protocol::{self, ClientEnvelope, SetupInfo, StatusMessage},
    supervisor::ConnectionSupervisor,
};
use crate::state::AppState;
use aerodesk_core::tools::ToolRegistry;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use gemini_realtime::{ModelConnection, ModelSink, ModelSource, Received};
use std::{pin::Pin, sync::Arc};
use tokio::{sync::Mutex, task::JoinSet};
use tracing::{Span, error, field, info, instrument, warn};

pub type ClientSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;
pub type ClientStream = Pin<Box<dyn Stream<Item = Result<Message, axum::Error>> + Send>>;
/// The browser's write half, shared by the supervisor and the model pump.
pub type SharedClientSink = Arc<Mutex<ClientSink>>;

const UNSET: &str = "n/a";

/// Attribution for the current run. Only used in logs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub run_id: String,
    pub user_id: String,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            run_id: UNSET.to_string(),
            user_id: UNSET.to_string(),
        }
    }
}

impl SessionContext {
    fn apply(&mut self, setup: SetupInfo) {
        self.run_id = setup.run_id;
        self.user_id = setup.user_id.unwrap_or_else(|| UNSET.to_string());
    }
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (socket_tx, socket_rx) = socket.split();
    let client_tx: ClientSink = Box::pin(socket_tx);
    let client_rx: ClientStream = Box::pin(socket_rx);

    let supervisor = ConnectionSupervisor::new(state.connector.clone(), state.tools.clone());
    serve_client(&supervisor, Arc::new(Mutex::new(client_tx)), client_rx).await;
}

/// Drives one browser connection to completion. The span picks up the run
/// and user once the client sends its setup.
#[instrument(
    name = "ws_session",
    skip_all,
    fields(connection_id, run_id = field::Empty, user_id = field::Empty)
)]
pub(crate) async fn serve_client(
    supervisor: &ConnectionSupervisor,
    client_tx: SharedClientSink,
    mut client_rx: ClientStream,
) {
    let connection_id: u32 = rand::random();
    Span::current().record("connection_id", connection_id);
    info!("New WebSocket connection.");

    let context = Arc::new(Mutex::new(SessionContext::default()));
    match supervisor
        .run(client_tx.clone(), &mut client_rx, context)
        .await
    {
        Ok(()) => info!("Session finished."),
        Err(e) => error!(error = %e, "Session terminated with error."),
    }

    if let Err(e) = client_tx.lock().await.close().await {
        warn!(error = %e, "Failed to close client connection");
    }
}

/// Serializes and sends a status notice to the browser.
pub(crate) async fn send_status(
    client_tx: &Mutex<ClientSink>,
    status: StatusMessage,
) -> Result<(), SessionError> {
    let serialized = serde_json::to_string(&status)?;
    client_tx
        .lock()
        .await
        .send(Message::Text(serialized.into()))
        .await?;
    Ok(())
}

/// Runs the two relay pumps over one established model connection.
pub struct RelaySession {
    connection: ModelConnection,
    client_tx: SharedClientSink,
    dispatcher: ToolDispatcher,
    context: Arc<Mutex<SessionContext>>,
}

impl RelaySession {
    /// `context` belongs to the browser connection and outlives reconnects.
    pub fn new(
        connection: ModelConnection,
        client_tx: SharedClientSink,
        tools: Arc<ToolRegistry>,
        context: Arc<Mutex<SessionContext>>,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(tools, connection.sink.clone());
        Self {
            connection,
            client_tx,
            dispatcher,
            context,
        }
    }

    /// Pumps until either side finishes. Tool calls still running at that
    /// point are cancelled before this returns.
    pub async fn run(self, client_rx: &mut ClientStream) -> Result<(), SessionError> {
        let ModelConnection { sink, mut source } = self.connection;
        let mut tasks = JoinSet::new();

        let outcome = tokio::select! {
            result = client_to_model(client_rx, sink.as_ref(), &self.context) => result,
            result = model_to_client(source.as_mut(), &self.client_tx, &self.dispatcher, &mut tasks) => result,
        };

        tasks.shutdown().await;
        outcome
    }
}

async fn client_to_model(
    client_rx: &mut ClientStream,
    model: &dyn ModelSink,
    context: &Mutex<SessionContext>,
) -> Result<(), SessionError> {
    while let Some(next) = client_rx.next().await {
        let raw = match next {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    warn!("Received non-UTF-8 binary input from client");
                    continue;
                }
            },
            Ok(Message::Close(_)) => {
                let user_id = context.lock().await.user_id.clone();
                info!(user_id = %user_id, "Client closed connection.");
                return Ok(());
            }
            Ok(_) => continue,
            Err(e) => {
                let user_id = context.lock().await.user_id.clone();
                error!(user_id = %user_id, error = %e, "Error receiving from client");
                return Ok(());
            }
        };

        match ClientEnvelope::parse(&raw) {
            ClientEnvelope::RealtimeInput | ClientEnvelope::ClientContent => {
                model.send_text(raw).await?;
            }
            ClientEnvelope::Setup(setup) => {
                let mut ctx = context.lock().await;
                ctx.apply(setup);
                let span = Span::current();
                span.record("run_id", field::display(&ctx.run_id));
                span.record("user_id", field::display(&ctx.user_id));
                info!(log_type = "setup", run_id = %ctx.run_id, user_id = %ctx.user_id, "Setup");
            }
            ClientEnvelope::Unexpected => {
                warn!(input = %raw, "Received unexpected input from client");
            }
        }
    }
    info!("Client stream ended.");
    Ok(())
}

async fn model_to_client(
    source: &mut dyn ModelSource,
    client_tx: &Mutex<ClientSink>,
    dispatcher: &ToolDispatcher,
    tasks: &mut JoinSet<()>,
) -> Result<(), SessionError> {
    loop {
        match source.recv().await {
            Received::Frame(frame) => {
                // Forward first; tool dispatch must never delay audio.
                if let Err(e) = client_tx
                    .lock()
                    .await
                    .send(Message::Binary(frame.clone()))
                    .await
                {
                    warn!(error = %e, "Failed to forward frame to client");
                    return Ok(());
                }
                if let Some(calls) = protocol::tool_calls(&frame) {
                    dispatcher.dispatch(calls, tasks);
                }
                while let Some(finished) = tasks.try_join_next() {
                    if let Err(e) = finished {
                        error!(error = %e, "Tool dispatch task failed");
                    }
                }
            }
            Received::Closed => {
                info!("Model closed the connection.");
                return Ok(());
            }
            Received::Error(e) => return Err(e.into()),
        }
    }
}
