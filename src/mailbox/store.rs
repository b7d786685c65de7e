//! SQLite-backed entity store
//!
//! Thin data access over bots, rooms, and messages. No business rules live
//! here; the store is also the only layer that knows how ids and access keys
//! are minted.

use super::{Bot, BotId, Message, MessageDirection, MessageDraft, MessageId, Room, RoomId};
use crate::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::path::Path;
use uuid::Uuid;

/// Mint an opaque entity id
fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Mint an access key secret
fn new_access_key() -> String {
    Uuid::new_v4().to_string()
}

/// Parse a stored rfc3339 timestamp
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// SQLite store for mailbox entities
pub struct MailboxStore {
    conn: Connection,
}

impl MailboxStore {
    /// Open (or create) the store at the given path
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!(path = %db_path.display(), "Opening mailbox store");

        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bots (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                access_key TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                bot_id TEXT NOT NULL,
                access_key TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_rooms_bot ON rooms(bot_id);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                direction TEXT NOT NULL,
                text TEXT NOT NULL,
                reply_to TEXT,
                read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_unread ON messages(room_id, direction, read);
            CREATE INDEX IF NOT EXISTS idx_messages_room ON messages(room_id);
            "#,
        )?;
        Ok(())
    }

    /// Register a new bot with a freshly minted id and access key
    pub fn create_bot(&self, name: &str, description: &str) -> Result<Bot> {
        let bot = Bot {
            id: BotId::from_string(new_id()),
            name: name.to_string(),
            description: description.to_string(),
            access_key: new_access_key(),
            created_at: Utc::now(),
        };

        self.conn.execute(
            r#"
            INSERT INTO bots (id, name, description, access_key, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                bot.id.as_str(),
                bot.name,
                bot.description,
                bot.access_key,
                bot.created_at.to_rfc3339(),
            ],
        )?;

        Ok(bot)
    }

    /// All bots in registration order
    pub fn list_bots(&self) -> Result<Vec<Bot>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, description, access_key, created_at
            FROM bots
            ORDER BY created_at, rowid
            "#,
        )?;
        let rows = stmt.query_map([], |row| self.row_to_bot(row))?;

        let mut bots = Vec::new();
        for row in rows {
            bots.push(row?);
        }
        Ok(bots)
    }

    /// Look up a bot by id
    pub fn get_bot(&self, id: &BotId) -> Result<Option<Bot>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, description, access_key, created_at
            FROM bots
            WHERE id = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![id.as_str()], |row| self.row_to_bot(row))?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Open a new room under a bot with a freshly minted id and access key
    pub fn create_room(&self, bot_id: &BotId) -> Result<Room> {
        let room = Room {
            id: RoomId::from_string(new_id()),
            bot_id: bot_id.clone(),
            access_key: new_access_key(),
            created_at: Utc::now(),
        };

        self.conn.execute(
            r#"
            INSERT INTO rooms (id, bot_id, access_key, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                room.id.as_str(),
                room.bot_id.as_str(),
                room.access_key,
                room.created_at.to_rfc3339(),
            ],
        )?;

        Ok(room)
    }

    /// All rooms owned by a bot, in creation order
    pub fn list_rooms(&self, bot_id: &BotId) -> Result<Vec<Room>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, bot_id, access_key, created_at
            FROM rooms
            WHERE bot_id = ?1
            ORDER BY created_at, rowid
            "#,
        )?;
        let rows = stmt.query_map(params![bot_id.as_str()], |row| self.row_to_room(row))?;

        let mut rooms = Vec::new();
        for row in rows {
            rooms.push(row?);
        }
        Ok(rooms)
    }

    /// Look up a room by id
    pub fn get_room(&self, id: &RoomId) -> Result<Option<Room>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, bot_id, access_key, created_at
            FROM rooms
            WHERE id = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![id.as_str()], |row| self.row_to_room(row))?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Look up a message by id
    pub fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, room_id, direction, text, reply_to, read, created_at
            FROM messages
            WHERE id = ?1
            "#,
        )?;
        let mut rows = stmt.query_map(params![id.as_str()], |row| self.row_to_message(row))?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Unread messages of one direction in a room, in creation order
    pub fn unread_messages(
        &self,
        room_id: &RoomId,
        direction: MessageDirection,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, room_id, direction, text, reply_to, read, created_at
            FROM messages
            WHERE room_id = ?1 AND direction = ?2 AND read = 0
            ORDER BY created_at, rowid
            "#,
        )?;
        let rows = stmt.query_map(params![room_id.as_str(), direction.as_str()], |row| {
            self.row_to_message(row)
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Flip the read flag on the given messages in one batch update
    ///
    /// Returns the number of rows changed.
    pub fn mark_read(&self, ids: &[MessageId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("UPDATE messages SET read = 1 WHERE id IN ({})", placeholders);
        let changed = self.conn.execute(
            &sql,
            rusqlite::params_from_iter(ids.iter().map(|id| id.as_str())),
        )?;

        Ok(changed)
    }

    /// Persist a batch of drafts as one bulk insert
    ///
    /// Every message in the batch gets the same server timestamp and a
    /// freshly minted id. Either the whole batch lands or none of it does.
    pub fn insert_messages(
        &mut self,
        room_id: &RoomId,
        direction: MessageDirection,
        drafts: &[MessageDraft],
    ) -> Result<Vec<Message>> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        let mut stored = Vec::with_capacity(drafts.len());

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO messages (id, room_id, direction, text, reply_to, read, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
                "#,
            )?;

            for draft in drafts {
                let id = new_id();
                stmt.execute(params![
                    id,
                    room_id.as_str(),
                    direction.as_str(),
                    draft.text,
                    draft.reply_to.as_ref().map(|r| r.as_str()),
                    now.to_rfc3339(),
                ])?;

                stored.push(Message {
                    id: MessageId::from_string(id),
                    room_id: room_id.clone(),
                    direction,
                    text: draft.text.clone(),
                    reply_to: draft.reply_to.clone(),
                    read: false,
                    created_at: now,
                });
            }
        }

        tx.commit()?;
        Ok(stored)
    }

    /// Convert a database row to a Bot
    fn row_to_bot(&self, row: &rusqlite::Row) -> SqliteResult<Bot> {
        let created_at: String = row.get(4)?;
        Ok(Bot {
            id: BotId::from_string(row.get::<_, String>(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
            access_key: row.get(3)?,
            created_at: parse_timestamp(&created_at),
        })
    }

    /// Convert a database row to a Room
    fn row_to_room(&self, row: &rusqlite::Row) -> SqliteResult<Room> {
        let created_at: String = row.get(3)?;
        Ok(Room {
            id: RoomId::from_string(row.get::<_, String>(0)?),
            bot_id: BotId::from_string(row.get::<_, String>(1)?),
            access_key: row.get(2)?,
            created_at: parse_timestamp(&created_at),
        })
    }

    /// Convert a database row to a Message
    fn row_to_message(&self, row: &rusqlite::Row) -> SqliteResult<Message> {
        let direction_str: String = row.get(2)?;
        let direction = MessageDirection::from_str(&direction_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown message direction: {}", direction_str).into(),
            )
        })?;
        let created_at: String = row.get(6)?;

        Ok(Message {
            id: MessageId::from_string(row.get::<_, String>(0)?),
            room_id: RoomId::from_string(row.get::<_, String>(1)?),
            direction,
            text: row.get(3)?,
            reply_to: row
                .get::<_, Option<String>>(4)?
                .map(MessageId::from_string),
            read: row.get(5)?,
            created_at: parse_timestamp(&created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (MailboxStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("botline.db");
        let store = MailboxStore::open(db_path).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_create_and_get_bot() {
        let (store, _dir) = create_test_store();

        let bot = store.create_bot("greeter", "says hello").unwrap();
        assert!(!bot.id.as_str().is_empty());
        assert!(!bot.access_key.is_empty());

        let fetched = store.get_bot(&bot.id).unwrap().unwrap();
        assert_eq!(fetched.name, "greeter");
        assert_eq!(fetched.access_key, bot.access_key);

        let missing = store.get_bot(&BotId::from_string("nope")).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_ids_and_keys_are_unique() {
        let (store, _dir) = create_test_store();

        let a = store.create_bot("a", "").unwrap();
        let b = store.create_bot("b", "").unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(a.access_key, b.access_key);
    }

    #[test]
    fn test_rooms_listed_in_creation_order() {
        let (store, _dir) = create_test_store();

        let bot = store.create_bot("greeter", "").unwrap();
        let r1 = store.create_room(&bot.id).unwrap();
        let r2 = store.create_room(&bot.id).unwrap();
        assert_ne!(r1.access_key, r2.access_key);

        let rooms = store.list_rooms(&bot.id).unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].id, r1.id);
        assert_eq!(rooms[1].id, r2.id);

        // Other bots see nothing
        let other = store.create_bot("other", "").unwrap();
        assert!(store.list_rooms(&other.id).unwrap().is_empty());
    }

    #[test]
    fn test_unread_selection_by_direction() {
        let (mut store, _dir) = create_test_store();

        let bot = store.create_bot("greeter", "").unwrap();
        let room = store.create_room(&bot.id).unwrap();

        store
            .insert_messages(
                &room.id,
                MessageDirection::User,
                &[MessageDraft::new("first"), MessageDraft::new("second")],
            )
            .unwrap();

        let unread = store
            .unread_messages(&room.id, MessageDirection::User)
            .unwrap();
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].text, "first");
        assert_eq!(unread[1].text, "second");
        assert!(unread.iter().all(|m| !m.read));

        // The other direction has nothing unread
        let bot_side = store
            .unread_messages(&room.id, MessageDirection::Bot)
            .unwrap();
        assert!(bot_side.is_empty());
    }

    #[test]
    fn test_mark_read() {
        let (mut store, _dir) = create_test_store();

        let bot = store.create_bot("greeter", "").unwrap();
        let room = store.create_room(&bot.id).unwrap();

        let stored = store
            .insert_messages(
                &room.id,
                MessageDirection::User,
                &[MessageDraft::new("a"), MessageDraft::new("b")],
            )
            .unwrap();

        let ids: Vec<MessageId> = stored.iter().map(|m| m.id.clone()).collect();
        let changed = store.mark_read(&ids).unwrap();
        assert_eq!(changed, 2);

        let unread = store
            .unread_messages(&room.id, MessageDirection::User)
            .unwrap();
        assert!(unread.is_empty());

        // The messages are still there, flagged read
        let fetched = store.get_message(&ids[0]).unwrap().unwrap();
        assert!(fetched.read);
    }

    #[test]
    fn test_mark_read_empty_batch() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.mark_read(&[]).unwrap(), 0);
    }

    #[test]
    fn test_batch_shares_timestamp() {
        let (mut store, _dir) = create_test_store();

        let bot = store.create_bot("greeter", "").unwrap();
        let room = store.create_room(&bot.id).unwrap();

        let stored = store
            .insert_messages(
                &room.id,
                MessageDirection::Bot,
                &[MessageDraft::new("one"), MessageDraft::new("two")],
            )
            .unwrap();

        assert_eq!(stored[0].created_at, stored[1].created_at);
    }

    #[test]
    fn test_reply_to_round_trip() {
        let (mut store, _dir) = create_test_store();

        let bot = store.create_bot("greeter", "").unwrap();
        let room = store.create_room(&bot.id).unwrap();

        let roots = store
            .insert_messages(&room.id, MessageDirection::User, &[MessageDraft::new("hi")])
            .unwrap();

        let replies = store
            .insert_messages(
                &room.id,
                MessageDirection::Bot,
                &[MessageDraft::new("hello").in_reply_to(roots[0].id.clone())],
            )
            .unwrap();

        let fetched = store.get_message(&replies[0].id).unwrap().unwrap();
        assert_eq!(fetched.reply_to, Some(roots[0].id.clone()));
        assert_eq!(fetched.direction, MessageDirection::Bot);
    }
}
