//! Persistence seams for chat history, contact submissions and status checks.
//!
//! Two interchangeable backends:
//! - `MemoryStore`: process-lifetime, DashMap backed
//! - `PgStore`: durable, Postgres via sqlx
//!
//! Callers only see the traits below, so the backend is picked once at startup.

mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::chat::StoredMessage;
use crate::models::contact::ContactSubmission;
use crate::models::status::StatusCheck;

pub use memory::MemoryStore;
pub use postgres::{DbPool, PgStore};

/// Upper bound on status checks returned by `StatusStore::list`
pub const STATUS_LIST_LIMIT: usize = 1000;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

/// Ordered per-session message history.
///
/// Unknown ids read as an empty history. Appends for the same id are not
/// serialized here; concurrent writers race at the backend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Vec<StoredMessage>, StorageError>;

    /// Append one user/assistant exchange, creating the session if absent.
    /// Either both messages are stored or neither is.
    async fn append(
        &self,
        session_id: &str,
        user: StoredMessage,
        assistant: StoredMessage,
    ) -> Result<(), StorageError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn insert(&self, submission: ContactSubmission) -> Result<(), StorageError>;
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn insert(&self, check: StatusCheck) -> Result<(), StorageError>;
    async fn list(&self) -> Result<Vec<StatusCheck>, StorageError>;
}
