//! In-memory store.

use super::{Store, StoreError};
use crate::message::Message;
use crate::presence::Participant;
use crate::router::MessageQuery;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::trace;

/// A message together with its position in the log.
#[derive(Debug)]
struct LogEntry {
    seq: u64,
    message: Message,
}

/// Store backed by process memory.
///
/// Participants live in a concurrent map; messages in a vector kept in
/// sequence order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    participants: DashMap<String, Participant>,
    messages: RwLock<Vec<LogEntry>>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_participant(&self, name: &str) -> Result<Option<Participant>, StoreError> {
        Ok(self.participants.get(name).map(|p| p.clone()))
    }

    async fn insert_participant(&self, participant: Participant) -> Result<bool, StoreError> {
        match self.participants.entry(participant.name.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(participant);
                Ok(true)
            }
        }
    }

    async fn touch_participant(&self, name: &str, at: u64) -> Result<bool, StoreError> {
        match self.participants.get_mut(name) {
            Some(mut p) => {
                p.touch(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_participant(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.participants.remove(name).is_some())
    }

    async fn remove_stale_participant(&self, name: &str, cutoff: u64) -> Result<bool, StoreError> {
        Ok(self
            .participants
            .remove_if(name, |_, p| p.last_heartbeat < cutoff)
            .is_some())
    }

    async fn participants(&self) -> Result<Vec<Participant>, StoreError> {
        Ok(self.participants.iter().map(|p| p.value().clone()).collect())
    }

    async fn append_message(&self, message: Message) -> Result<(), StoreError> {
        let mut log = self.messages.write().await;
        // Taken under the write lock so the log stays sorted by seq.
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        trace!(seq, from = %message.from, "Appending message");
        log.push(LogEntry { seq, message });
        Ok(())
    }

    async fn messages(&self, query: MessageQuery) -> Result<Vec<Message>, StoreError> {
        let log = self.messages.read().await;
        let visible = |e: &&LogEntry| query.matches(&e.message);

        let messages: Vec<Message> = match query.limit {
            Some(limit) => log
                .iter()
                .rev()
                .filter(visible)
                .take(limit)
                .map(|e| e.message.clone())
                .collect(),
            None => log.iter().filter(visible).map(|e| e.message.clone()).collect(),
        };
        Ok(messages)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, BROADCAST};

    #[tokio::test]
    async fn test_insert_is_exclusive() {
        let store = MemoryStore::new();

        assert!(store.insert_participant(Participant::with_heartbeat("ana", 1)).await.unwrap());
        assert!(!store.insert_participant(Participant::with_heartbeat("ana", 2)).await.unwrap());

        let p = store.find_participant("ana").await.unwrap().unwrap();
        assert_eq!(p.last_heartbeat, 1);
    }

    #[tokio::test]
    async fn test_remove_stale_rechecks_heartbeat() {
        let store = MemoryStore::new();
        store.insert_participant(Participant::with_heartbeat("ana", 100)).await.unwrap();

        assert!(!store.remove_stale_participant("ana", 100).await.unwrap());
        assert!(store.touch_participant("ana", 500).await.unwrap());
        assert!(!store.remove_stale_participant("ana", 200).await.unwrap());
        assert!(store.remove_stale_participant("ana", 501).await.unwrap());
        assert!(store.find_participant("ana").await.unwrap().is_none());
        assert!(!store.remove_stale_participant("ana", 1_000).await.unwrap());
    }

    #[tokio::test]
    async fn test_messages_sequence() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .append_message(Message::new("ana", BROADCAST, i.to_string(), MessageKind::Message))
                .await
                .unwrap();
        }

        let log = store.messages.read().await;
        let seqs: Vec<u64> = log.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }
}
