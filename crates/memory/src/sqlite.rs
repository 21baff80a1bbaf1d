//! SQLite memory store: profile, facts and chat history.
//!
//! One database file, three tables:
//! - `profile`: key/value pairs, upserted on save
//! - `facts`: append-only `(category, label, value)` rows
//! - `chat_history`: per-thread messages in insertion order
//!
//! The same file also hosts the document index tables; see
//! [`crate::documents`]. Both share one pool via [`open_pool`].

use async_trait::async_trait;
use chrono::Utc;
use nova_core::error::MemoryError;
use nova_core::memory::{Fact, FactStore, ProfileStore, TurnLog};
use nova_core::message::{ConversationTurn, Message, Role, ThreadId};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// Open (creating if missing) a SQLite database.
///
/// Pass `"sqlite::memory:"` for an in-process ephemeral database.
pub async fn open_pool(path: &str) -> Result<SqlitePool, MemoryError> {
    let options = SqliteConnectOptions::from_str(path)
        .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

    info!("SQLite database opened at {path}");
    Ok(pool)
}

/// Persistent profile, fact and turn storage.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database at `path` and run migrations.
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        Self::from_pool(open_pool(path).await?).await
    }

    /// Wrap an existing pool (shared with the document index).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        let statements = [
            (
                "profile table",
                r#"
                CREATE TABLE IF NOT EXISTS profile (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                )
                "#,
            ),
            (
                "facts table",
                r#"
                CREATE TABLE IF NOT EXISTS facts (
                    id       INTEGER PRIMARY KEY AUTOINCREMENT,
                    category TEXT NOT NULL,
                    label    TEXT NOT NULL,
                    value    TEXT NOT NULL
                )
                "#,
            ),
            (
                "chat_history table",
                r#"
                CREATE TABLE IF NOT EXISTS chat_history (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    thread_id  TEXT NOT NULL,
                    role       TEXT NOT NULL,
                    content    TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )
                "#,
            ),
            (
                "chat_history index",
                "CREATE INDEX IF NOT EXISTS idx_chat_history_thread ON chat_history(thread_id, id)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| MemoryError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("Memory store migrations complete");
        Ok(())
    }
}

fn row_to_fact(row: &SqliteRow) -> Result<Fact, sqlx::Error> {
    Ok(Fact {
        category: row.try_get("category")?,
        label: row.try_get("label")?,
        value: row.try_get("value")?,
    })
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn get_profile(&self, key: &str) -> Result<Option<String>, MemoryError> {
        let row = sqlx::query("SELECT value FROM profile WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("profile lookup: {e}")))?;

        row.map(|r| r.try_get::<String, _>("value"))
            .transpose()
            .map_err(|e| MemoryError::QueryFailed(format!("value column: {e}")))
    }

    async fn set_profile(&self, key: &str, value: &str) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO profile (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("profile upsert: {e}")))?;

        debug!(key, "Profile value saved");
        Ok(())
    }
}

#[async_trait]
impl FactStore for SqliteStore {
    async fn get_facts(&self) -> Result<Vec<Fact>, MemoryError> {
        let rows = sqlx::query("SELECT category, label, value FROM facts ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("facts scan: {e}")))?;

        rows.iter()
            .map(row_to_fact)
            .collect::<Result<_, _>>()
            .map_err(|e| MemoryError::QueryFailed(format!("fact row: {e}")))
    }

    async fn get_facts_in(&self, category: &str) -> Result<Vec<Fact>, MemoryError> {
        let rows = sqlx::query(
            "SELECT category, label, value FROM facts WHERE category = ?1 ORDER BY id",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("facts by category: {e}")))?;

        rows.iter()
            .map(row_to_fact)
            .collect::<Result<_, _>>()
            .map_err(|e| MemoryError::QueryFailed(format!("fact row: {e}")))
    }

    async fn add_fact(&self, fact: Fact) -> Result<(), MemoryError> {
        sqlx::query("INSERT INTO facts (category, label, value) VALUES (?1, ?2, ?3)")
            .bind(&fact.category)
            .bind(&fact.label)
            .bind(&fact.value)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("fact insert: {e}")))?;

        debug!(category = %fact.category, label = %fact.label, "Fact stored");
        Ok(())
    }

    async fn clear_facts(&self) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM facts")
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("facts clear: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl TurnLog for SqliteStore {
    async fn save_turn(&self, turn: &ConversationTurn) -> Result<(), MemoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("begin: {e}")))?;

        for (role, content) in [(Role::User, &turn.user), (Role::Assistant, &turn.assistant)] {
            sqlx::query(
                "INSERT INTO chat_history (thread_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(turn.thread_id.as_str())
            .bind(role.as_str())
            .bind(content)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| MemoryError::Storage(format!("history insert: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("commit: {e}")))?;

        debug!(thread = %turn.thread_id, "Turn saved");
        Ok(())
    }

    async fn load_history(&self, thread_id: &ThreadId) -> Result<Vec<Message>, MemoryError> {
        let rows = sqlx::query(
            "SELECT id, role, content, created_at FROM chat_history WHERE thread_id = ?1 ORDER BY id",
        )
        .bind(thread_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("history scan: {e}")))?;

        rows.iter()
            .map(|row| -> Result<Message, sqlx::Error> {
                let id: i64 = row.try_get("id")?;
                let role: String = row.try_get("role")?;
                let content: String = row.try_get("content")?;
                let created_at: String = row.try_get("created_at")?;
                Ok(Message {
                    id: id.to_string(),
                    role: Role::parse(&role),
                    content,
                    timestamp: chrono::DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect::<Result<_, _>>()
            .map_err(|e| MemoryError::QueryFailed(format!("history row: {e}")))
    }

    async fn clear_history(&self, thread_id: &ThreadId) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM chat_history WHERE thread_id = ?1")
            .bind(thread_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("history clear: {e}")))?;
        Ok(())
    }

    async fn recent_threads(&self, limit: usize) -> Result<Vec<ThreadId>, MemoryError> {
        let rows = sqlx::query(
            "SELECT thread_id, MAX(id) AS last_id FROM chat_history \
             GROUP BY thread_id ORDER BY last_id DESC LIMIT ?1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("thread scan: {e}")))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("thread_id").map(ThreadId))
            .collect::<Result<_, _>>()
            .map_err(|e| MemoryError::QueryFailed(format!("thread row: {e}")))
    }
}
