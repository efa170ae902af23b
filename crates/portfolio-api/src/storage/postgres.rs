use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::time::Duration;
use tracing::{debug, info};

use super::{ContactStore, SessionStore, StatusStore, StorageError, STATUS_LIST_LIMIT};
use crate::config::DatabaseConfig;
use crate::models::chat::{Role, StoredMessage};
use crate::models::contact::ContactSubmission;
use crate::models::status::StatusCheck;

#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    pub async fn new(url: &str, config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
            .connect(url)
            .await?;

        // Test connection
        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS chat_sessions (
        session_id TEXT PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chat_messages (
        id BIGSERIAL PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES chat_sessions(session_id),
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_chat_messages_session
        ON chat_messages (session_id, id)"#,
    r#"CREATE TABLE IF NOT EXISTS contact_submissions (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        company TEXT,
        subject TEXT NOT NULL,
        message TEXT NOT NULL,
        status TEXT NOT NULL,
        submitted_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS status_checks (
        id TEXT PRIMARY KEY,
        client_name TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL
    )"#,
];

#[derive(FromRow)]
struct MessageRow {
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = StorageError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse().map_err(StorageError::Corrupt)?;
        Ok(StoredMessage {
            role,
            content: row.content,
            timestamp: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct StatusRow {
    id: String,
    client_name: String,
    timestamp: DateTime<Utc>,
}

/// Postgres-backed storage for all three record kinds
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create tables if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(self.pool.get_pool()).await?;
        }
        info!("Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn get(&self, session_id: &str) -> Result<Vec<StoredMessage>, StorageError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"SELECT role, content, created_at
               FROM chat_messages
               WHERE session_id = $1
               ORDER BY id ASC"#,
        )
        .bind(session_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        debug!("Loaded {} messages for session {}", rows.len(), session_id);

        rows.into_iter().map(StoredMessage::try_from).collect()
    }

    async fn append(
        &self,
        session_id: &str,
        user: StoredMessage,
        assistant: StoredMessage,
    ) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.get_pool().begin().await?;

        sqlx::query(
            r#"INSERT INTO chat_sessions (session_id, created_at, updated_at)
               VALUES ($1, $2, $2)
               ON CONFLICT (session_id) DO UPDATE SET updated_at = EXCLUDED.updated_at"#,
        )
        .bind(session_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for message in [user, assistant] {
            sqlx::query(
                r#"INSERT INTO chat_messages (session_id, role, content, created_at)
                   VALUES ($1, $2, $3, $4)"#,
            )
            .bind(session_id)
            .bind(message.role.as_str())
            .bind(message.content)
            .bind(message.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ContactStore for PgStore {
    async fn insert(&self, submission: ContactSubmission) -> Result<(), StorageError> {
        sqlx::query(
            r#"INSERT INTO contact_submissions
                (id, name, email, company, subject, message, status, submitted_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(submission.id)
        .bind(&submission.name)
        .bind(&submission.email)
        .bind(&submission.company)
        .bind(&submission.subject)
        .bind(&submission.message)
        .bind(submission.status.as_str())
        .bind(submission.submitted_at)
        .execute(self.pool.get_pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for PgStore {
    async fn insert(&self, check: StatusCheck) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO status_checks (id, client_name, timestamp) VALUES ($1, $2, $3)")
            .bind(&check.id)
            .bind(&check.client_name)
            .bind(check.timestamp)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StatusCheck>, StorageError> {
        let rows = sqlx::query_as::<_, StatusRow>(
            r#"SELECT id, client_name, timestamp
               FROM status_checks
               ORDER BY timestamp ASC
               LIMIT $1"#,
        )
        .bind(STATUS_LIST_LIMIT as i64)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| StatusCheck {
                id: row.id,
                client_name: row.client_name,
                timestamp: row.timestamp,
            })
            .collect())
    }
}
