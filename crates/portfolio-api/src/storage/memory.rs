use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ContactStore, SessionStore, StatusStore, StorageError, STATUS_LIST_LIMIT};
use crate::models::chat::{SessionId, StoredMessage};
use crate::models::contact::ContactSubmission;
use crate::models::status::StatusCheck;

#[derive(Debug, Clone)]
struct SessionRecord {
    messages: Vec<StoredMessage>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Thread-safe in-process storage.
/// Nothing is evicted; data lives as long as the process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<DashMap<SessionId, SessionRecord>>,
    contacts: Arc<DashMap<Uuid, ContactSubmission>>,
    status_checks: Arc<DashMap<String, StatusCheck>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("Initializing in-memory store");
        Self::default()
    }

    /// Number of sessions with at least one exchange
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contact(&self, id: &Uuid) -> Option<ContactSubmission> {
        self.contacts.get(id).map(|entry| entry.value().clone())
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Last write time of a session, if it exists
    pub fn session_updated_at(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.sessions.get(session_id).map(|entry| entry.updated_at)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, session_id: &str) -> Result<Vec<StoredMessage>, StorageError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|entry| entry.messages.clone())
            .unwrap_or_default())
    }

    async fn append(
        &self,
        session_id: &str,
        user: StoredMessage,
        assistant: StoredMessage,
    ) -> Result<(), StorageError> {
        let now = Utc::now();
        // Both pushes happen under the same shard guard
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord {
                messages: Vec::new(),
                created_at: now,
                updated_at: now,
            });
        entry.messages.push(user);
        entry.messages.push(assistant);
        entry.updated_at = now;

        debug!(
            "Session {} now holds {} messages (created {})",
            session_id,
            entry.messages.len(),
            entry.created_at
        );
        Ok(())
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn insert(&self, submission: ContactSubmission) -> Result<(), StorageError> {
        self.contacts.insert(submission.id, submission);
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn insert(&self, check: StatusCheck) -> Result<(), StorageError> {
        self.status_checks.insert(check.id.clone(), check);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StatusCheck>, StorageError> {
        let mut checks: Vec<StatusCheck> = self
            .status_checks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        checks.sort_by_key(|check| check.timestamp);
        checks.truncate(STATUS_LIST_LIMIT);
        Ok(checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = MemoryStore::new();
        let history = SessionStore::get(&store, "missing").await.unwrap();
        assert!(history.is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_append_keeps_insertion_order() {
        let store = MemoryStore::new();

        store
            .append("s1", StoredMessage::user("q1"), StoredMessage::assistant("a1"))
            .await
            .unwrap();
        let first_write = store.session_updated_at("s1").unwrap();

        store
            .append("s1", StoredMessage::user("q2"), StoredMessage::assistant("a2"))
            .await
            .unwrap();

        let history = SessionStore::get(&store, "s1").await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert!(store.session_updated_at("s1").unwrap() >= first_write);
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = MemoryStore::new();
        store
            .append("a", StoredMessage::user("for a"), StoredMessage::assistant("reply a"))
            .await
            .unwrap();

        assert_eq!(SessionStore::get(&store, "a").await.unwrap().len(), 2);
        assert!(SessionStore::get(&store, "b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_checks_listed_oldest_first() {
        let store = MemoryStore::new();
        let mut older = StatusCheck::new("first");
        older.timestamp = Utc::now() - chrono::Duration::seconds(60);
        let newer = StatusCheck::new("second");

        StatusStore::insert(&store, newer.clone()).await.unwrap();
        StatusStore::insert(&store, older.clone()).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![older, newer]);
    }
}
