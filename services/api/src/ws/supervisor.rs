//! Reconnect-with-backoff around relay sessions.

use super::{
    SessionError,
    protocol::StatusMessage,
    session::{ClientStream, RelaySession, SessionContext, SharedClientSink, send_status},
};
use aerodesk_core::tools::ToolRegistry;
use gemini_realtime::ModelConnector;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Exponential backoff without jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total connection attempts, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            factor: 2,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// The wait before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.factor.saturating_pow(retry))
            .min(self.max_delay)
    }
}

pub struct ConnectionSupervisor {
    connector: Arc<dyn ModelConnector>,
    tools: Arc<ToolRegistry>,
    policy: BackoffPolicy,
}

impl ConnectionSupervisor {
    pub fn new(connector: Arc<dyn ModelConnector>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            connector,
            tools,
            policy: BackoffPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Connects and relays until the session ends. Only unexpected model
    /// drops are retried; the last one is returned once attempts run out.
    /// Every attempt shares `context`, so a setup survives reconnects.
    pub async fn run(
        &self,
        client_tx: SharedClientSink,
        client_rx: &mut ClientStream,
        context: Arc<Mutex<SessionContext>>,
    ) -> Result<(), SessionError> {
        let mut attempt = 1;
        loop {
            match self.attempt(&client_tx, client_rx, &context).await {
                Err(SessionError::Transport(e))
                    if e.is_connection_closed() && attempt < self.policy.max_attempts =>
                {
                    let wait = self.policy.delay(attempt - 1);
                    warn!(
                        attempt,
                        wait_secs = wait.as_secs(),
                        error = %e,
                        "Model connection closed, backing off"
                    );
                    send_status(&client_tx, StatusMessage::retrying(wait)).await?;
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn attempt(
        &self,
        client_tx: &SharedClientSink,
        client_rx: &mut ClientStream,
        context: &Arc<Mutex<SessionContext>>,
    ) -> Result<(), SessionError> {
        let connection = self.connector.connect().await?;
        let model = connection.sink.clone();

        let result = async {
            send_status(client_tx, StatusMessage::ready()).await?;
            info!("Starting bidirectional communication");
            RelaySession::new(
                connection,
                client_tx.clone(),
                self.tools.clone(),
                context.clone(),
            )
            .run(client_rx)
                .await
        }
        .await;

        model.close().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeClient, ScriptedConnector, drain_outbound, dropped, fake_client, fake_connection,
        new_context, next_text, status_texts, text,
    };
    use gemini_realtime::{Received, TransportError};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_backoff_delays() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (0..9).map(|i| policy.delay(i).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64, 128, 256]);
        assert_eq!(policy.delay(20), Duration::from_secs(300));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_attempts_run_out_then_propagates() {
        let connector = Arc::new(ScriptedConnector::new(
            (0..12).map(|i| Err(dropped(&format!("drop {i}")))).collect(),
        ));
        let supervisor = ConnectionSupervisor::new(connector.clone(), Arc::new(ToolRegistry::new()));
        let mut client = fake_client();

        let started = tokio::time::Instant::now();
        let err = supervisor
            .run(client.tx.clone(), &mut client.rx, new_context())
            .await
            .unwrap_err();

        assert_eq!(connector.attempts(), 10);
        match err {
            SessionError::Transport(TransportError::ConnectionClosed { reason, .. }) => {
                assert_eq!(reason, "drop 9")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(started.elapsed(), Duration::from_secs(511));

        let statuses = status_texts(&drain_outbound(&mut client));
        let expected: Vec<String> = [1, 2, 4, 8, 16, 32, 64, 128, 256]
            .iter()
            .map(|n| format!("Model connection error, retrying in {n} seconds..."))
            .collect();
        assert_eq!(statuses, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_mid_session_drop() {
        let (first, first_handle) = fake_connection();
        let (second, second_handle) = fake_connection();
        first_handle
            .frames
            .send(Received::Error(dropped("reset")))
            .unwrap();
        drop(second_handle.frames);

        let connector = Arc::new(ScriptedConnector::new(vec![Ok(first), Ok(second)]));
        let supervisor = ConnectionSupervisor::new(connector.clone(), Arc::new(ToolRegistry::new()));
        let mut client = fake_client();

        supervisor
            .run(client.tx.clone(), &mut client.rx, new_context())
            .await
            .unwrap();

        assert_eq!(connector.attempts(), 2);
        assert!(first_handle.closed.load(Ordering::SeqCst));
        assert!(second_handle.closed.load(Ordering::SeqCst));
        assert_eq!(
            status_texts(&drain_outbound(&mut client)),
            vec![
                "Backend is ready for conversation",
                "Model connection error, retrying in 1 seconds...",
                "Backend is ready for conversation",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let connector = Arc::new(ScriptedConnector::new(vec![Err(TransportError::Connect(
            "handshake refused".into(),
        ))]));
        let supervisor = ConnectionSupervisor::new(connector.clone(), Arc::new(ToolRegistry::new()));
        let mut client = fake_client();

        let err = supervisor
            .run(client.tx.clone(), &mut client.rx, new_context())
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Transport(TransportError::Connect(_))));
        assert_eq!(connector.attempts(), 1);
        assert!(drain_outbound(&mut client).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_policy_bounds_attempts() {
        let connector = Arc::new(ScriptedConnector::new(
            (0..5).map(|_| Err(dropped("flaky"))).collect(),
        ));
        let supervisor = ConnectionSupervisor::new(connector.clone(), Arc::new(ToolRegistry::new()))
            .with_policy(BackoffPolicy {
                max_attempts: 3,
                ..BackoffPolicy::default()
            });
        let mut client = fake_client();

        assert!(
            supervisor
                .run(client.tx.clone(), &mut client.rx, new_context())
                .await
                .is_err()
        );
        assert_eq!(connector.attempts(), 3);
        assert_eq!(status_texts(&drain_outbound(&mut client)).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_survives_reconnect() {
        let (first, mut first_handle) = fake_connection();
        let (second, mut second_handle) = fake_connection();
        let connector = Arc::new(ScriptedConnector::new(vec![Ok(first), Ok(second)]));
        let supervisor = ConnectionSupervisor::new(connector, Arc::new(ToolRegistry::new()));
        let context = new_context();

        let FakeClient {
            tx,
            mut rx,
            inbound,
            mut outbound,
        } = fake_client();
        let run = {
            let context = context.clone();
            tokio::spawn(async move { supervisor.run(tx, &mut rx, context).await })
        };

        assert!(next_text(&mut outbound).await.contains("ready"));

        inbound
            .unbounded_send(text(r#"{"setup":{"run_id":"r1","user_id":"u1"}}"#))
            .unwrap();
        inbound
            .unbounded_send(text(r#"{"realtimeInput":{"n":1}}"#))
            .unwrap();
        assert_eq!(
            first_handle.sent.recv().await.unwrap(),
            r#"{"realtimeInput":{"n":1}}"#
        );

        first_handle
            .frames
            .send(Received::Error(dropped("reset")))
            .unwrap();
        assert!(next_text(&mut outbound).await.contains("retrying in 1 seconds"));
        assert!(next_text(&mut outbound).await.contains("ready"));

        inbound
            .unbounded_send(text(r#"{"realtimeInput":{"n":2}}"#))
            .unwrap();
        assert_eq!(
            second_handle.sent.recv().await.unwrap(),
            r#"{"realtimeInput":{"n":2}}"#
        );
        assert_eq!(
            *context.lock().await,
            SessionContext {
                run_id: "r1".into(),
                user_id: "u1".into(),
            }
        );

        inbound.close_channel();
        run.await.unwrap().unwrap();
    }
}
