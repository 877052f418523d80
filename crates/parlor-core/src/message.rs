//! Chat message types.
//!
//! Messages are immutable once created. Their order is the order in which
//! the store accepted them.

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recipient marker meaning "everyone in the room".
pub const BROADCAST: &str = "Todos";

/// Status text appended when a participant joins.
pub const JOIN_TEXT: &str = "entra na sala...";

/// Status text appended when a participant leaves or is evicted.
pub const LEAVE_TEXT: &str = "sai da sala...";

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Current local time of day as `HH:MM:SS`.
#[must_use]
pub fn time_of_day() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// The kind of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A user message, usually addressed to everyone.
    Message,
    /// A user message addressed to a single participant.
    PrivateMessage,
    /// A system-generated join/leave notice.
    Status,
}

impl MessageKind {
    /// Parse a kind that a participant is allowed to send.
    ///
    /// `status` is reserved for the room itself and is rejected here.
    #[must_use]
    pub fn from_user_input(s: &str) -> Option<Self> {
        match s {
            "message" => Some(Self::Message),
            "private_message" => Some(Self::PrivateMessage),
            _ => None,
        }
    }

    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::PrivateMessage => "private_message",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(Self::Status),
            other => Self::from_user_input(other).ok_or_else(|| format!("unknown message kind: {other}")),
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender name.
    pub from: String,
    /// Recipient name, or [`BROADCAST`].
    pub to: String,
    /// Message body.
    pub text: String,
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Local time of day when the message was created.
    pub time: String,
}

impl Message {
    /// Create a message stamped with the current time of day.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            text: text.into(),
            kind,
            time: time_of_day(),
        }
    }

    /// Broadcast notice that `name` entered the room.
    #[must_use]
    pub fn joined(name: impl Into<String>) -> Self {
        Self::new(name, BROADCAST, JOIN_TEXT, MessageKind::Status)
    }

    /// Broadcast notice that `name` left the room.
    #[must_use]
    pub fn left(name: impl Into<String>) -> Self {
        Self::new(name, BROADCAST, LEAVE_TEXT, MessageKind::Status)
    }

    /// Whether `viewer` may see this message.
    ///
    /// A message is visible to its sender, its recipient, and everyone when
    /// addressed to [`BROADCAST`]. Without a viewer only broadcasts match.
    #[must_use]
    pub fn is_visible_to(&self, viewer: Option<&str>) -> bool {
        if self.to == BROADCAST {
            return true;
        }
        match viewer {
            Some(v) => self.from == v || self.to == v,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        let joined = Message::joined("ana");
        assert_eq!(joined.from, "ana");
        assert_eq!(joined.to, BROADCAST);
        assert_eq!(joined.text, JOIN_TEXT);
        assert_eq!(joined.kind, MessageKind::Status);

        let left = Message::left("ana");
        assert_eq!(left.text, LEAVE_TEXT);
        assert_eq!(left.kind, MessageKind::Status);
    }

    #[test]
    fn test_time_of_day_format() {
        let time = time_of_day();
        assert_eq!(time.len(), 8);
        assert_eq!(time.as_bytes()[2], b':');
        assert_eq!(time.as_bytes()[5], b':');
    }

    #[test]
    fn test_user_kinds() {
        assert_eq!(MessageKind::from_user_input("message"), Some(MessageKind::Message));
        assert_eq!(
            MessageKind::from_user_input("private_message"),
            Some(MessageKind::PrivateMessage)
        );
        assert_eq!(MessageKind::from_user_input("status"), None);
        assert_eq!(MessageKind::from_user_input("Message"), None);
        assert_eq!("status".parse::<MessageKind>(), Ok(MessageKind::Status));
    }

    #[test]
    fn test_visibility() {
        let broadcast = Message::new("ana", BROADCAST, "oi", MessageKind::Message);
        assert!(broadcast.is_visible_to(Some("bia")));
        assert!(broadcast.is_visible_to(None));

        let private = Message::new("ana", "bia", "psiu", MessageKind::PrivateMessage);
        assert!(private.is_visible_to(Some("ana")));
        assert!(private.is_visible_to(Some("bia")));
        assert!(!private.is_visible_to(Some("caio")));
        assert!(!private.is_visible_to(None));
    }

    #[test]
    fn test_wire_format() {
        let msg = Message::new("ana", "Todos", "oi", MessageKind::PrivateMessage);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "private_message");
        assert_eq!(json["from"], "ana");
        assert!(json.get("kind").is_none());
    }
}
