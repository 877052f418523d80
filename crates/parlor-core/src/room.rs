//! The chat room.
//!
//! A [`Room`] is a cheap, cloneable handle around the injected [`Store`].
//! Participant operations live in [`crate::presence`] and message operations
//! in [`crate::router`].

use crate::error::ChatError;
use crate::store::Store;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Default maximum participant name length, in characters.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 256;

/// Default maximum message text length, in bytes.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 64 * 1024;

/// Room configuration.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Maximum participant name length, in characters.
    pub max_name_length: usize,
    /// Maximum message text length, in bytes.
    pub max_text_length: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }
}

/// Handle to the chat room and its store.
#[derive(Clone)]
pub struct Room {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) config: RoomConfig,
}

impl Room {
    /// Create a room over the given store with default limits.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_config(store, RoomConfig::default())
    }

    /// Create a room over the given store with custom limits.
    #[must_use]
    pub fn with_config(store: Arc<dyn Store>, config: RoomConfig) -> Self {
        info!(backend = store.name(), "Creating room with config: {:?}", config);
        Self { store, config }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The room limits.
    #[must_use]
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub(crate) fn validate_name(&self, name: &str) -> Result<(), ChatError> {
        if name.is_empty() {
            return Err(ChatError::Validation("name cannot be empty".into()));
        }
        if name.chars().count() > self.config.max_name_length {
            return Err(ChatError::Validation("name too long".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_validate_name() {
        let room = Room::with_config(
            Arc::new(MemoryStore::new()),
            RoomConfig {
                max_name_length: 4,
                ..RoomConfig::default()
            },
        );

        assert!(room.validate_name("ana").is_ok());
        assert!(room.validate_name("joão").is_ok());
        assert!(matches!(room.validate_name(""), Err(ChatError::Validation(_))));
        assert!(matches!(room.validate_name("maria"), Err(ChatError::Validation(_))));
    }
}
