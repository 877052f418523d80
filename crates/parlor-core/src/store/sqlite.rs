//! SQLite store.
//!
//! Participants are keyed by name; messages get an autoincrement id that is
//! the source of truth for "most recent".

use super::{Store, StoreError};
use crate::message::{Message, MessageKind, BROADCAST};
use crate::presence::Participant;
use crate::router::MessageQuery;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS participants (
        name        TEXT PRIMARY KEY NOT NULL,
        last_status INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        sender    TEXT NOT NULL,
        recipient TEXT NOT NULL,
        text      TEXT NOT NULL,
        kind      TEXT NOT NULL,
        time      TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages (recipient)",
    "CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages (sender)",
];

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(e.to_string())
            }
            _ => StoreError::Query(e.to_string()),
        }
    }
}

/// Store backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `database_url` and create the tables if needed.
    ///
    /// In-memory databases (`sqlite::memory:`) are held on a single
    /// connection that is never recycled, since each connection would
    /// otherwise see its own empty database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await?
        };

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        info!(url = %database_url, "SQLite store ready");
        Ok(Self { pool })
    }
}

fn to_db_millis(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn participant_from_row(row: &SqliteRow) -> Result<Participant, StoreError> {
    let last_status: i64 = row.try_get("last_status")?;
    Ok(Participant {
        name: row.try_get("name")?,
        last_heartbeat: u64::try_from(last_status)
            .map_err(|_| StoreError::Corrupt(format!("negative heartbeat: {last_status}")))?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message, StoreError> {
    let kind: String = row.try_get("kind")?;
    Ok(Message {
        from: row.try_get("sender")?,
        to: row.try_get("recipient")?,
        text: row.try_get("text")?,
        kind: MessageKind::from_str(&kind).map_err(StoreError::Corrupt)?,
        time: row.try_get("time")?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_participant(&self, name: &str) -> Result<Option<Participant>, StoreError> {
        let row = sqlx::query("SELECT name, last_status FROM participants WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(participant_from_row).transpose()
    }

    async fn insert_participant(&self, participant: Participant) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO participants (name, last_status) VALUES (?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(&participant.name)
        .bind(to_db_millis(participant.last_heartbeat))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn touch_participant(&self, name: &str, at: u64) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE participants SET last_status = ? WHERE name = ?")
            .bind(to_db_millis(at))
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_participant(&self, name: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM participants WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_stale_participant(&self, name: &str, cutoff: u64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM participants WHERE name = ? AND last_status < ?")
            .bind(name)
            .bind(to_db_millis(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn participants(&self) -> Result<Vec<Participant>, StoreError> {
        let rows = sqlx::query("SELECT name, last_status FROM participants")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(participant_from_row).collect()
    }

    async fn append_message(&self, message: Message) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (sender, recipient, text, kind, time) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.from)
        .bind(&message.to)
        .bind(&message.text)
        .bind(message.kind.as_str())
        .bind(&message.time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn messages(&self, query: MessageQuery) -> Result<Vec<Message>, StoreError> {
        let filter = if query.viewer.is_some() {
            "recipient = ? OR sender = ? OR recipient = ?"
        } else {
            "recipient = ?"
        };
        let order = match query.limit {
            Some(_) => "ORDER BY id DESC LIMIT ?",
            None => "ORDER BY id ASC",
        };
        let sql = format!(
            "SELECT sender, recipient, text, kind, time FROM messages WHERE {filter} {order}"
        );

        let mut q = sqlx::query(&sql).bind(BROADCAST);
        if let Some(viewer) = &query.viewer {
            q = q.bind(viewer).bind(viewer);
        }
        if let Some(limit) = query.limit {
            q = q.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(message_from_row).collect()
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
