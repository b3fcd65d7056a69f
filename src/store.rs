//! Durable, deduplicated local message history.
//!
//! A single SQLite file holds three tables: the per-channel message log,
//! channel metadata (topics), and local key/value settings. Every call
//! opens its own connection, applies one atomic change, and closes; there
//! are no cross-call transactions and no long-lived handle to poison.
//!
//! Deduplication is the store's one correctness job: `(channel,
//! delivery_token)` is UNIQUE, and a constraint violation on insert is the
//! normal "already seen" signal reported as `Ok(false)`, never an error.
//! That makes `append` idempotent and commutative across transport
//! replays, which is what upgrades the subscription loop's at-least-once
//! delivery to exactly-once persistence.

use std::path::{Path, PathBuf};

use chrono::Local;
use rusqlite::{Connection, ErrorCode, params};

use crate::error::StoreError;
use crate::message::{Message, SYSTEM_USER};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    channel        TEXT NOT NULL,
    user           TEXT NOT NULL,
    body           TEXT NOT NULL,
    timestamp      TEXT NOT NULL,
    delivery_token TEXT NOT NULL,
    broadcast      INTEGER NOT NULL DEFAULT 0,
    whisper_to     TEXT,
    UNIQUE (channel, delivery_token)
);
CREATE TABLE IF NOT EXISTS channels (
    name       TEXT PRIMARY KEY,
    topic      TEXT,
    updated_at TEXT
);
CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT
);
";

/// Deduplicating append-only history store backed by one SQLite file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Open (creating if needed) the store at `path` and ensure the schema
    /// exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store
            .call(|conn| conn.execute_batch(SCHEMA).map_err(Into::into))
            .await?;
        Ok(store)
    }

    /// Run one store operation on a fresh connection off the async runtime.
    async fn call<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn =
                Connection::open(&path).map_err(|e| StoreError::Open(e.to_string()))?;
            op(&conn)
        })
        .await
        .map_err(|_| StoreError::TaskCancelled)?
    }

    /// Append a message. Returns `Ok(false)` when a record with the same
    /// `(channel, delivery_token)` already exists. This is the dedup contract,
    /// not a failure.
    pub async fn append(&self, message: &Message) -> Result<bool, StoreError> {
        let m = message.clone();
        self.call(move |conn| {
            let result = conn.execute(
                "INSERT INTO messages (channel, user, body, timestamp, delivery_token, broadcast, whisper_to)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    m.channel,
                    m.user,
                    m.text,
                    m.timestamp,
                    m.delivery_token,
                    m.broadcast as i64,
                    m.whisper_to,
                ],
            );
            match result {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    /// The latest `limit` messages for a channel, oldest first.
    ///
    /// Storage order is reverse-chronological (`ORDER BY id DESC`); the
    /// rows are reversed before returning since every consumer expects
    /// chronological order.
    pub async fn recent(&self, channel: &str, limit: u32) -> Result<Vec<Message>, StoreError> {
        let channel = channel.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT channel, user, body, timestamp, delivery_token, broadcast, whisper_to
                 FROM messages WHERE channel = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![channel, limit], |row| {
                Ok(Message {
                    channel: row.get(0)?,
                    user: row.get(1)?,
                    text: row.get(2)?,
                    timestamp: row.get(3)?,
                    delivery_token: row.get(4)?,
                    broadcast: row.get::<_, i64>(5)? != 0,
                    whisper_to: row.get(6)?,
                })
            })?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            messages.reverse();
            Ok(messages)
        })
        .await
    }

    /// Delete all history for a channel. Returns the number of rows
    /// removed.
    pub async fn clear(&self, channel: &str) -> Result<usize, StoreError> {
        let channel = channel.to_string();
        self.call(move |conn| {
            conn.execute("DELETE FROM messages WHERE channel = ?1", params![channel])
                .map_err(Into::into)
        })
        .await
    }

    /// Set a channel topic. Overwrites unconditionally, last write wins.
    pub async fn set_topic(&self, channel: &str, topic: &str) -> Result<(), StoreError> {
        let channel = channel.to_string();
        let topic = topic.to_string();
        self.call(move |conn| {
            let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            conn.execute(
                "INSERT INTO channels (name, topic, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET topic = excluded.topic,
                                                 updated_at = excluded.updated_at",
                params![channel, topic, now],
            )?;
            Ok(())
        })
        .await
    }

    /// The current topic for a channel, if one was ever set.
    pub async fn topic(&self, channel: &str) -> Result<Option<String>, StoreError> {
        let channel = channel.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare("SELECT topic FROM channels WHERE name = ?1")?;
            let topic = stmt
                .query_row(params![channel], |row| row.get::<_, Option<String>>(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(topic.flatten())
        })
        .await
    }

    /// Upsert a local setting (e.g. `nick`).
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = value.to_string();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    /// Read a local setting.
    pub async fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
            let value = stmt
                .query_row(params![key], |row| row.get::<_, Option<String>>(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(value.flatten())
        })
        .await
    }

    /// Distinct users seen in a channel's history, excluding SYSTEM.
    pub async fn distinct_users(&self, channel: &str) -> Result<Vec<String>, StoreError> {
        let channel = channel.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT user FROM messages
                 WHERE channel = ?1 AND user != ?2
                 ORDER BY user",
            )?;
            let rows = stmt.query_map(params![channel, SYSTEM_USER], |row| row.get(0))?;
            let mut users = Vec::new();
            for row in rows {
                users.push(row?);
            }
            Ok(users)
        })
        .await
    }
}
