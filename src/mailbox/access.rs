//! Access resolution
//!
//! Derives the caller's role from a presented access key and the route's
//! bot/room identifiers. The resolved bundle is the only input the mailbox
//! engine trusts for direction tagging and filtering; nothing downstream
//! re-derives a role from client data.

use super::{Bot, BotId, MessageDirection, Room, RoomId};
use crate::mailbox::MailboxStore;
use crate::{BotlineError, Result};

/// The caller's proven role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Holder of the bot's key
    Bot,
    /// Holder of this room's key
    User,
    /// No key, or a key matching neither side
    Unauthenticated,
}

impl Role {
    /// Whether the caller proved any role
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Role::Unauthenticated)
    }

    /// Direction stamped on messages this role produces
    pub fn direction(&self) -> Option<MessageDirection> {
        match self {
            Role::Bot => Some(MessageDirection::Bot),
            Role::User => Some(MessageDirection::User),
            Role::Unauthenticated => None,
        }
    }
}

/// The outcome of access resolution for one request
///
/// An explicit value bundle passed into handlers and the engine; there is no
/// request-scoped ambient state.
#[derive(Debug, Clone)]
pub struct ResolvedAccess {
    /// The bot named in the route
    pub bot: Bot,
    /// The room named in the route, when the route is room-scoped
    pub room: Option<Room>,
    /// What the presented key proved
    pub role: Role,
}

impl ResolvedAccess {
    /// Resolve the entities a route names and the role a key proves
    ///
    /// Existence is settled before any key comparison: an unknown bot or
    /// room fails with `NotFound` regardless of the key, and a room reached
    /// through the wrong bot looks exactly like a missing room. A key that
    /// matches neither side yields `Unauthenticated`, never a default role.
    /// Bot-key equality is checked before room-key equality.
    pub fn resolve(
        store: &MailboxStore,
        bot_id: &BotId,
        room_id: Option<&RoomId>,
        presented_key: Option<&str>,
    ) -> Result<Self> {
        let bot = store
            .get_bot(bot_id)?
            .ok_or_else(|| BotlineError::NotFound(format!("bot {}", bot_id)))?;

        let room = match room_id {
            Some(room_id) => {
                let room = store
                    .get_room(room_id)?
                    .ok_or_else(|| BotlineError::NotFound(format!("room {}", room_id)))?;

                // Cross-bot access must not reveal that the room exists
                if room.bot_id != bot.id {
                    return Err(BotlineError::NotFound(format!("room {}", room_id)));
                }

                Some(room)
            }
            None => None,
        };

        let role = match presented_key {
            Some(key) if key == bot.access_key => Role::Bot,
            Some(key) if room.as_ref().is_some_and(|r| key == r.access_key) => Role::User,
            _ => Role::Unauthenticated,
        };

        Ok(Self { bot, room, role })
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
    fn test_bot_key_resolves_bot_role() {
        let (store, _dir) = create_test_store();
        let bot = store.create_bot("greeter", "").unwrap();
        let room = store.create_room(&bot.id).unwrap();

        let access =
            ResolvedAccess::resolve(&store, &bot.id, Some(&room.id), Some(&bot.access_key))
                .unwrap();
        assert_eq!(access.role, Role::Bot);
        assert_eq!(access.bot.id, bot.id);
        assert_eq!(access.room.as_ref().map(|r| r.id.clone()), Some(room.id));
    }

    #[test]
    fn test_room_key_resolves_user_role() {
        let (store, _dir) = create_test_store();
        let bot = store.create_bot("greeter", "").unwrap();
        let room = store.create_room(&bot.id).unwrap();

        let access =
            ResolvedAccess::resolve(&store, &bot.id, Some(&room.id), Some(&room.access_key))
                .unwrap();
        assert_eq!(access.role, Role::User);
    }

    #[test]
    fn test_room_key_without_room_proves_nothing() {
        let (store, _dir) = create_test_store();
        let bot = store.create_bot("greeter", "").unwrap();
        let room = store.create_room(&bot.id).unwrap();

        // On a bot-scoped route the room key is just a wrong key
        let access =
            ResolvedAccess::resolve(&store, &bot.id, None, Some(&room.access_key)).unwrap();
        assert_eq!(access.role, Role::Unauthenticated);

        let access =
            ResolvedAccess::resolve(&store, &bot.id, None, Some(&bot.access_key)).unwrap();
        assert_eq!(access.role, Role::Bot);
        assert!(access.room.is_none());
    }

    #[test]
    fn test_wrong_or_absent_key_fails_closed() {
        let (store, _dir) = create_test_store();
        let bot = store.create_bot("greeter", "").unwrap();
        let room = store.create_room(&bot.id).unwrap();

        let access =
            ResolvedAccess::resolve(&store, &bot.id, Some(&room.id), Some("not-a-key")).unwrap();
        assert_eq!(access.role, Role::Unauthenticated);

        let access = ResolvedAccess::resolve(&store, &bot.id, Some(&room.id), None).unwrap();
        assert_eq!(access.role, Role::Unauthenticated);
    }

    #[test]
    fn test_unknown_ids_fail_before_key_comparison() {
        let (store, _dir) = create_test_store();
        let bot = store.create_bot("greeter", "").unwrap();

        let err = ResolvedAccess::resolve(
            &store,
            &BotId::from_string("missing"),
            None,
            Some(&bot.access_key),
        )
        .unwrap_err();
        assert!(matches!(err, BotlineError::NotFound(_)));

        let err = ResolvedAccess::resolve(
            &store,
            &bot.id,
            Some(&RoomId::from_string("missing")),
            Some(&bot.access_key),
        )
        .unwrap_err();
        assert!(matches!(err, BotlineError::NotFound(_)));
    }

    #[test]
    fn test_cross_bot_room_looks_missing() {
        let (store, _dir) = create_test_store();
        let bot_a = store.create_bot("a", "").unwrap();
        let bot_b = store.create_bot("b", "").unwrap();
        let room_b = store.create_room(&bot_b.id).unwrap();

        // Even a valid key for bot A cannot see bot B's room through A's route
        let err = ResolvedAccess::resolve(
            &store,
            &bot_a.id,
            Some(&room_b.id),
            Some(&bot_a.access_key),
        )
        .unwrap_err();
        assert!(matches!(err, BotlineError::NotFound(_)));
    }

    #[test]
    fn test_role_direction() {
        assert_eq!(Role::Bot.direction(), Some(MessageDirection::Bot));
        assert_eq!(Role::User.direction(), Some(MessageDirection::User));
        assert_eq!(Role::Unauthenticated.direction(), None);
        assert!(Role::Bot.is_authenticated());
        assert!(!Role::Unauthenticated.is_authenticated());
    }
}
