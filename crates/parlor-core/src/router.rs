//! Message routing for Parlor.
//!
//! Participants post broadcast or private messages and read back the feed
//! of messages addressed to them.

use crate::error::ChatError;
use crate::message::{Message, MessageKind};
use crate::room::Room;
use tracing::{debug, trace};

/// A recipient-scoped feed request.
///
/// With a `limit`, the feed holds the `limit` most recent visible messages,
/// newest first. Without one it holds every visible message, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    /// The participant reading the feed.
    pub viewer: Option<String>,
    /// Maximum number of messages; always positive when set.
    pub limit: Option<usize>,
}

impl MessageQuery {
    /// Feed for `viewer`.
    #[must_use]
    pub fn for_viewer(viewer: impl Into<String>) -> Self {
        Self {
            viewer: Some(viewer.into()),
            limit: None,
        }
    }

    /// Restrict the feed to the `limit` most recent messages.
    ///
    /// A zero limit means no limit.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Whether `message` belongs in this feed.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        message.is_visible_to(self.viewer.as_deref())
    }
}

/// Parse a `limit` query value.
///
/// Leading whitespace and an optional sign are accepted, followed by the
/// longest run of digits; trailing garbage is ignored. Returns `None` for
/// anything that does not yield a positive number.
#[must_use]
pub fn parse_limit(raw: &str) -> Option<usize> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if negative || digits.is_empty() {
        return None;
    }
    // Overflowing values are still "a positive number".
    let value = digits.parse::<usize>().unwrap_or(usize::MAX);
    (value > 0).then_some(value)
}

impl Room {
    /// Post a message on behalf of `sender`.
    ///
    /// The request is validated before the sender is looked up.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Validation`] for an empty recipient or text,
    /// oversized text, or a kind other than `message`/`private_message`;
    /// [`ChatError::NotFound`] if the sender is not in the room; and
    /// [`ChatError::Store`] if the store fails.
    pub async fn post_message(
        &self,
        sender: &str,
        to: &str,
        text: &str,
        kind: &str,
    ) -> Result<Message, ChatError> {
        if to.is_empty() {
            return Err(ChatError::Validation("recipient cannot be empty".into()));
        }
        if text.is_empty() {
            return Err(ChatError::Validation("text cannot be empty".into()));
        }
        if text.len() > self.config.max_text_length {
            return Err(ChatError::Validation("text too long".into()));
        }
        let kind = MessageKind::from_user_input(kind)
            .ok_or_else(|| ChatError::Validation(format!("invalid message type: {kind}")))?;

        if self.store.find_participant(sender).await?.is_none() {
            return Err(ChatError::NotFound(sender.to_string()));
        }

        let message = Message::new(sender, to, text, kind);
        self.store.append_message(message.clone()).await?;
        debug!(from = %sender, to = %to, kind = %kind, "Message posted");

        Ok(message)
    }

    /// Get the messages visible to the query's viewer.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] if the store fails.
    pub async fn messages(&self, query: MessageQuery) -> Result<Vec<Message>, ChatError> {
        let messages = self.store.messages(query.clone()).await?;
        trace!(viewer = ?query.viewer, limit = ?query.limit, count = messages.len(), "Feed served");
        Ok(messages)
    }
}
