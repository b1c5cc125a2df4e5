//! In-Memory Chat Sessions
//!
//! Conversation history for the text agent, keyed by user and session id.
//! Nothing is persisted; a restart forgets every conversation.

use async_openai::types::ChatCompletionRequestMessage;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// One conversation with the text agent.
#[derive(Debug)]
pub struct ChatSession {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    /// Message history. Held for the duration of a turn, which serializes
    /// concurrent requests against the same session.
    pub history: Mutex<Vec<ChatCompletionRequestMessage>>,
}

/// Stores chat sessions for the lifetime of the process.
pub struct InMemorySessionStore {
    app_name: String,
    sessions: RwLock<HashMap<(String, String), Arc<ChatSession>>>,
}

impl InMemorySessionStore {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub async fn get_session(&self, user_id: &str, session_id: &str) -> Option<Arc<ChatSession>> {
        self.sessions
            .read()
            .await
            .get(&(user_id.to_string(), session_id.to_string()))
            .cloned()
    }

    /// Creates a fresh session, replacing any existing one with the same key.
    pub async fn create_session(&self, user_id: &str, session_id: &str) -> Arc<ChatSession> {
        let session = Arc::new(ChatSession {
            app_name: self.app_name.clone(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            history: Mutex::new(Vec::new()),
        });
        self.sessions.write().await.insert(
            (user_id.to_string(), session_id.to_string()),
            session.clone(),
        );
        info!(app = %self.app_name, %user_id, %session_id, "Created chat session");
        session
    }

    pub async fn get_or_create(&self, user_id: &str, session_id: &str) -> Arc<ChatSession> {
        let key = (user_id.to_string(), session_id.to_string());
        if let Some(existing) = self.sessions.read().await.get(&key) {
            return existing.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key)
            .or_insert_with(|| {
                info!(app = %self.app_name, %user_id, %session_id, "Created chat session");
                Arc::new(ChatSession {
                    app_name: self.app_name.clone(),
                    user_id: user_id.to_string(),
                    session_id: session_id.to_string(),
                    history: Mutex::new(Vec::new()),
                })
            })
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_reuses_session() {
        let store = InMemorySessionStore::new("app");
        assert!(store.get_session("u1", "s1").await.is_none());

        let first = store.get_or_create("u1", "s1").await;
        let second = store.get_or_create("u1", "s1").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.app_name, "app");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_keyed_by_user_and_id() {
        let store = InMemorySessionStore::new("app");
        let a = store.get_or_create("u1", "s").await;
        let b = store.get_or_create("u2", "s").await;
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_create_session_replaces_existing() {
        let store = InMemorySessionStore::new("app");
        let old = store.get_or_create("u1", "s1").await;
        let new = store.create_session("u1", "s1").await;
        assert!(!Arc::ptr_eq(&old, &new));
        let fetched = store.get_session("u1", "s1").await.unwrap();
        assert!(Arc::ptr_eq(&fetched, &new));
    }
}
