//! Bot-to-user message relay
//!
//! The mailbox subsystem: capability-keyed access resolution plus the
//! store-and-forward rules for room messages.
//!
//! # Overview
//!
//! - **model**: Bots, rooms, and directional messages
//! - **store**: SQLite persistence; the only layer that mints ids and keys
//! - **access**: Resolves a presented key into a proven role
//! - **engine**: Deliver/send semantics with peek-vs-consume reads
//!
//! # Roles
//!
//! A room is a private two-party channel. Possession of the bot's key makes
//! the caller the bot for every room the bot owns; possession of a room's
//! key makes the caller the user of that one room. Messages are tagged with
//! the producing side and read by the opposite side.

mod access;
mod engine;
mod model;
mod store;

pub use access::{ResolvedAccess, Role};
pub use engine::MailboxEngine;
pub use model::{
    Bot, BotId, Message, MessageDirection, MessageDraft, MessageId, Room, RoomId,
};
pub use store::MailboxStore;
