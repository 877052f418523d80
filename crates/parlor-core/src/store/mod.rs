//! Storage abstraction for Parlor.
//!
//! A [`Store`] holds two collections: participants keyed by name, and an
//! append-only, insertion-ordered message log. Each call is atomic on its
//! own; there are no cross-call transactions.

#[cfg(test)]
pub(crate) mod flaky;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use crate::message::Message;
use crate::presence::Participant;
use crate::router::MessageQuery;
use async_trait::async_trait;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Stored data could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Persistence for participants and messages.
#[async_trait]
pub trait Store: Send + Sync {
    /// Look up a participant by name.
    async fn find_participant(&self, name: &str) -> Result<Option<Participant>, StoreError>;

    /// Insert a participant unless one with the same name exists.
    ///
    /// Returns `false` if the name was already taken.
    async fn insert_participant(&self, participant: Participant) -> Result<bool, StoreError>;

    /// Set a participant's last heartbeat.
    ///
    /// Returns `false` if the participant does not exist.
    async fn touch_participant(&self, name: &str, at: u64) -> Result<bool, StoreError>;

    /// Remove a participant.
    ///
    /// Returns `false` if the participant does not exist.
    async fn remove_participant(&self, name: &str) -> Result<bool, StoreError>;

    /// Remove a participant only if its last heartbeat is older than `cutoff`.
    ///
    /// Returns `false` if the participant is gone or has heartbeated since.
    async fn remove_stale_participant(&self, name: &str, cutoff: u64) -> Result<bool, StoreError>;

    /// All participants, in no particular order.
    async fn participants(&self) -> Result<Vec<Participant>, StoreError>;

    /// Append a message to the log.
    async fn append_message(&self, message: Message) -> Result<(), StoreError>;

    /// Messages matching `query`, ordered as described on [`MessageQuery`].
    async fn messages(&self, query: MessageQuery) -> Result<Vec<Message>, StoreError>;

    /// Backend name (e.g., "memory", "sqlite").
    fn name(&self) -> &'static str;
}
