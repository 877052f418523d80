//! Fault-injecting store for tests.

use super::{MemoryStore, Store, StoreError};
use crate::message::Message;
use crate::presence::Participant;
use crate::router::MessageQuery;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Wraps a memory store and injects failures.
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_snapshot: bool,
    pub fail_append: AtomicBool,
    pub fail_remove_for: Option<&'static str>,
    /// Heartbeat this participant (at the given time) right after a snapshot.
    pub touch_after_snapshot: Option<(&'static str, u64)>,
}

impl FlakyStore {
    pub fn set_fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }
}

fn injected() -> StoreError {
    StoreError::Unavailable("injected".into())
}

#[async_trait]
impl Store for FlakyStore {
    async fn find_participant(&self, name: &str) -> Result<Option<Participant>, StoreError> {
        self.inner.find_participant(name).await
    }

    async fn insert_participant(&self, p: Participant) -> Result<bool, StoreError> {
        self.inner.insert_participant(p).await
    }

    async fn touch_participant(&self, name: &str, at: u64) -> Result<bool, StoreError> {
        self.inner.touch_participant(name, at).await
    }

    async fn remove_participant(&self, name: &str) -> Result<bool, StoreError> {
        self.inner.remove_participant(name).await
    }

    async fn remove_stale_participant(&self, name: &str, cutoff: u64) -> Result<bool, StoreError> {
        if self.fail_remove_for == Some(name) {
            return Err(injected());
        }
        self.inner.remove_stale_participant(name, cutoff).await
    }

    async fn participants(&self) -> Result<Vec<Participant>, StoreError> {
        if self.fail_snapshot {
            return Err(injected());
        }
        let snapshot = self.inner.participants().await?;
        if let Some((name, at)) = self.touch_after_snapshot {
            self.inner.touch_participant(name, at).await?;
        }
        Ok(snapshot)
    }

    async fn append_message(&self, message: Message) -> Result<(), StoreError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.append_message(message).await
    }

    async fn messages(&self, query: MessageQuery) -> Result<Vec<Message>, StoreError> {
        self.inner.messages(query).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}
