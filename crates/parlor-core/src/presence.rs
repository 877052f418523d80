//! Participant presence for Parlor.
//!
//! Presence tracks who is in the room and when each participant last
//! signalled activity.

use crate::error::ChatError;
use crate::message::{now_millis, Message};
use crate::room::Room;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// A participant in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique name within the room.
    pub name: String,
    /// Last heartbeat, in milliseconds since the Unix epoch.
    #[serde(rename = "lastStatus")]
    pub last_heartbeat: u64,
}

impl Participant {
    /// Create a participant whose last heartbeat is now.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_heartbeat(name, now_millis())
    }

    /// Create a participant with an explicit heartbeat timestamp.
    #[must_use]
    pub fn with_heartbeat(name: impl Into<String>, last_heartbeat: u64) -> Self {
        Self {
            name: name.into(),
            last_heartbeat,
        }
    }

    /// Update the last heartbeat timestamp.
    pub fn touch(&mut self, now: u64) {
        self.last_heartbeat = now;
    }

    /// Time elapsed since the last heartbeat.
    #[must_use]
    pub fn idle_for(&self, now: u64) -> Duration {
        Duration::from_millis(now.saturating_sub(self.last_heartbeat))
    }

    /// Check if this participant is stale (idle for longer than `threshold`).
    #[must_use]
    pub fn is_stale(&self, now: u64, threshold: Duration) -> bool {
        self.idle_for(now) > threshold
    }
}

impl Room {
    /// Add a participant to the room.
    ///
    /// Appends a broadcast join notice on success. If the notice cannot be
    /// written the participant is removed again, so the name stays free.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Validation`] for an empty or oversized name,
    /// [`ChatError::Conflict`] if the name is taken, and
    /// [`ChatError::Store`] if the store fails.
    pub async fn join(&self, name: &str) -> Result<Participant, ChatError> {
        self.validate_name(name)?;

        let participant = Participant::new(name);
        if !self.store.insert_participant(participant.clone()).await? {
            debug!(participant = %name, "Join rejected: name taken");
            return Err(ChatError::Conflict(name.to_string()));
        }

        if let Err(e) = self.store.append_message(Message::joined(name)).await {
            if let Err(rollback) = self.store.remove_participant(name).await {
                error!(participant = %name, error = %rollback, "Join rollback failed");
            }
            return Err(e.into());
        }
        info!(participant = %name, "Participant joined");

        Ok(participant)
    }

    /// Refresh a participant's heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NotFound`] for an unknown name and
    /// [`ChatError::Store`] if the store fails.
    pub async fn heartbeat(&self, name: &str) -> Result<(), ChatError> {
        if !self.store.touch_participant(name, now_millis()).await? {
            return Err(ChatError::NotFound(name.to_string()));
        }
        debug!(participant = %name, "Heartbeat");
        Ok(())
    }

    /// Remove a participant and broadcast a leave notice.
    ///
    /// Returns `false` (and appends nothing) if the participant was already
    /// gone.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] if the store fails.
    pub async fn depart(&self, name: &str) -> Result<bool, ChatError> {
        if !self.store.remove_participant(name).await? {
            return Ok(false);
        }
        self.store.append_message(Message::left(name)).await?;
        info!(participant = %name, "Participant left");
        Ok(true)
    }

    /// Get all participants currently in the room, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] if the store fails.
    pub async fn participants(&self) -> Result<Vec<Participant>, ChatError> {
        Ok(self.store.participants().await?)
    }
}
