//! Mailbox entity types
//!
//! Bots, rooms, and the directional messages that flow between them. Ids are
//! opaque strings minted by the store; nothing outside the store layer knows
//! or cares about their format.

use chrono::{DateTime, Utc};

/// Unique bot identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BotId(String);

impl BotId {
    /// Create from an existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique room identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Create from an existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// Create from an existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a message
///
/// Direction records the producer, not the consumer: a `User` message is
/// addressed to the bot side of the room, a `Bot` message to the user side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    /// Produced by the bot
    Bot,
    /// Produced by the user of the room
    User,
}

impl MessageDirection {
    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageDirection::Bot => "bot",
            MessageDirection::User => "user",
        }
    }

    /// Parse the storage representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bot" => Some(MessageDirection::Bot),
            "user" => Some(MessageDirection::User),
            _ => None,
        }
    }

    /// The other side of the room
    pub fn opposite(&self) -> Self {
        match self {
            MessageDirection::Bot => MessageDirection::User,
            MessageDirection::User => MessageDirection::Bot,
        }
    }
}

impl std::fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered bot
#[derive(Debug, Clone)]
pub struct Bot {
    /// Opaque id
    pub id: BotId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Secret proving Bot-role, issued once at creation
    pub access_key: String,
    /// When the bot was registered
    pub created_at: DateTime<Utc>,
}

/// A private two-party channel between one bot and one user
#[derive(Debug, Clone)]
pub struct Room {
    /// Opaque id
    pub id: RoomId,
    /// Owning bot, immutable after creation
    pub bot_id: BotId,
    /// Secret proving User-role for this room, issued once at creation
    pub access_key: String,
    /// When the room was opened
    pub created_at: DateTime<Utc>,
}

/// A stored message
#[derive(Debug, Clone)]
pub struct Message {
    /// Opaque id
    pub id: MessageId,
    /// Room this message belongs to
    pub room_id: RoomId,
    /// Who produced it
    pub direction: MessageDirection,
    /// Message body
    pub text: String,
    /// Root message this one replies to, if any
    pub reply_to: Option<MessageId>,
    /// Consumption flag; flips false to true exactly once
    pub read: bool,
    /// Server-assigned creation time
    pub created_at: DateTime<Utc>,
}

/// A message to be sent, before the server assigns id, direction, and time
#[derive(Debug, Clone)]
pub struct MessageDraft {
    /// Message body
    pub text: String,
    /// Root message this one replies to, if any
    pub reply_to: Option<MessageId>,
}

impl MessageDraft {
    /// Create a draft with just text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_to: None,
        }
    }

    /// Mark this draft as a reply to a root message in the same room
    pub fn in_reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}
