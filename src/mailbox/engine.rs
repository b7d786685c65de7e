//! Mailbox read/write semantics
//!
//! The engine owns the rules around message flow: direction is forced from
//! the caller's resolved role, reads select the opposite direction's unread
//! messages, and a non-peek read consumes what it returns. The unread flag is
//! the only consumption marker; there is no cursor.

use super::{Bot, BotId, Message, MessageDirection, MessageDraft, MessageId, Role, Room, RoomId};
use crate::mailbox::MailboxStore;
use crate::{BotlineError, Result};

/// The mailbox engine, wrapping the entity store with business rules
pub struct MailboxEngine {
    store: MailboxStore,
    allow_replies: bool,
}

impl MailboxEngine {
    /// Create an engine over the given store
    pub fn new(store: MailboxStore, allow_replies: bool) -> Self {
        Self {
            store,
            allow_replies,
        }
    }

    /// The underlying store, for access resolution
    pub fn store(&self) -> &MailboxStore {
        &self.store
    }

    /// Register a new bot
    pub fn create_bot(&self, name: &str, description: &str) -> Result<Bot> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BotlineError::Validation(
                "bot name must not be empty".to_string(),
            ));
        }

        let bot = self.store.create_bot(name, description)?;
        tracing::info!(bot = %bot.id, name = %bot.name, "Registered bot");
        Ok(bot)
    }

    /// All registered bots
    pub fn list_bots(&self) -> Result<Vec<Bot>> {
        self.store.list_bots()
    }

    /// Open a new room under an existing bot
    pub fn create_room(&self, bot_id: &BotId) -> Result<Room> {
        self.store
            .get_bot(bot_id)?
            .ok_or_else(|| BotlineError::NotFound(format!("bot {}", bot_id)))?;

        let room = self.store.create_room(bot_id)?;
        tracing::info!(bot = %bot_id, room = %room.id, "Opened room");
        Ok(room)
    }

    /// All rooms owned by a bot
    pub fn list_rooms(&self, bot_id: &BotId) -> Result<Vec<Room>> {
        self.store
            .get_bot(bot_id)?
            .ok_or_else(|| BotlineError::NotFound(format!("bot {}", bot_id)))?;

        self.store.list_rooms(bot_id)
    }

    /// Read the unread messages addressed to `role` in one room
    ///
    /// A bot reads what the user produced and vice versa. With `peek` the
    /// selection is returned untouched; otherwise every selected message is
    /// flagged read in one batch update. Selection and flagging are two
    /// store calls, so two simultaneous non-peek reads may both see the same
    /// unread set.
    pub fn deliver(&self, room_id: &RoomId, role: Role, peek: bool) -> Result<Vec<Message>> {
        let own_direction = role.direction().ok_or(BotlineError::Unauthorized)?;

        let unread = self
            .store
            .unread_messages(room_id, own_direction.opposite())?;

        if !peek && !unread.is_empty() {
            let ids: Vec<MessageId> = unread.iter().map(|m| m.id.clone()).collect();
            let consumed = self.store.mark_read(&ids)?;
            tracing::debug!(room = %room_id, count = consumed, "Consumed messages");
        }

        Ok(unread)
    }

    /// Read unread user messages across every room a bot owns
    ///
    /// Only the bot role may fan in. Results are room-major in room creation
    /// order; there is no cross-room interleave guarantee, so callers wanting
    /// a global timeline must sort by creation time themselves.
    pub fn deliver_for_bot(&self, bot_id: &BotId, role: Role, peek: bool) -> Result<Vec<Message>> {
        if role != Role::Bot {
            return Err(BotlineError::Unauthorized);
        }

        let rooms = self.store.list_rooms(bot_id)?;
        let mut messages = Vec::new();

        for room in &rooms {
            let unread = self
                .store
                .unread_messages(&room.id, MessageDirection::User)?;
            messages.extend(unread);
        }

        if !peek && !messages.is_empty() {
            let ids: Vec<MessageId> = messages.iter().map(|m| m.id.clone()).collect();
            let consumed = self.store.mark_read(&ids)?;
            tracing::debug!(bot = %bot_id, rooms = rooms.len(), count = consumed, "Consumed messages");
        }

        Ok(messages)
    }

    /// Persist a batch of drafts into a room
    ///
    /// Direction comes from the resolved role, never from the drafts. The
    /// whole batch shares one timestamp and lands in one bulk insert; a
    /// failed insert persists nothing.
    pub fn send(
        &mut self,
        room_id: &RoomId,
        role: Role,
        drafts: &[MessageDraft],
    ) -> Result<Vec<Message>> {
        let direction = role.direction().ok_or(BotlineError::Unauthorized)?;

        if drafts.is_empty() {
            return Err(BotlineError::Validation(
                "message batch must not be empty".to_string(),
            ));
        }

        for draft in drafts {
            if draft.text.is_empty() {
                return Err(BotlineError::Validation(
                    "message text must not be empty".to_string(),
                ));
            }
            if let Some(reply_to) = &draft.reply_to {
                self.validate_reply(room_id, reply_to)?;
            }
        }

        let stored = self.store.insert_messages(room_id, direction, drafts)?;
        tracing::debug!(room = %room_id, direction = %direction, count = stored.len(), "Stored messages");
        Ok(stored)
    }

    /// Check a replyTo reference against the one-level threading rule
    ///
    /// The referenced message must exist in the same room and must itself be
    /// a root message. A reply cannot be replied to.
    fn validate_reply(&self, room_id: &RoomId, reply_to: &MessageId) -> Result<()> {
        if !self.allow_replies {
            return Err(BotlineError::Validation(
                "replies are not enabled on this server".to_string(),
            ));
        }

        let target = self.store.get_message(reply_to)?.ok_or_else(|| {
            BotlineError::Validation(format!("replyTo message {} does not exist", reply_to))
        })?;

        if target.room_id != *room_id {
            return Err(BotlineError::Validation(format!(
                "replyTo message {} is not in this room",
                reply_to
            )));
        }

        if target.reply_to.is_some() {
            return Err(BotlineError::Validation(format!(
                "replyTo message {} is itself a reply",
                reply_to
            )));
        }

        Ok(())
    }
}
