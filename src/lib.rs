//! Botline - Message relay for text conversations between bots and their users
//!
//! A bot owns any number of rooms, one per user conversation. Each room is a
//! private two-party channel; possession of an opaque access key, not an
//! account, proves whether the caller is the bot or the user of that room.
//! Messages wait in the room until the opposite side reads them, either
//! peeking (no side effects) or consuming (marking them read).
//!
//! # Architecture
//!
//! - **mailbox**: Entities, SQLite store, access resolution, and the
//!   deliver/send engine
//! - **server**: REST surface over the mailbox engine (axum)
//! - **config**: The ~/.config/botline/config.yaml file
//! - **error**: One error enum for the whole crate
//! - **logging**: tracing setup

// Core modules
pub mod config;
pub mod error;
pub mod mailbox;

// Surfaces
pub mod logging;
pub mod server;

// Re-exports
pub use error::{BotlineError, Result};
