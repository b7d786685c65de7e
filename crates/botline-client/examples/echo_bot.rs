//! Minimal echo bot built on the botline-client crate
//!
//! This example demonstrates the full bot lifecycle:
//! - Registering a bot and opening a room
//! - Sending a message as the room's user
//! - Polling for unread messages with peek, then consuming them
//! - Replying from the bot side
//!
//! A botline server must be running locally first:
//! ```sh
//! botline serve
//! ```
//!
//! To run this example:
//! ```sh
//! cd crates/botline-client
//! cargo run --example echo_bot
//! ```

use botline_client::{Client, MessageDraft, Result};

#[tokio::main]
async fn main() -> Result<()> {
    println!("Botline Echo Bot Example\n");

    let client = Client::default();

    // Register the bot. The access key in the handle is issued once and
    // never shown again, so a real bot would persist it.
    let bot = client.create_bot("echo", "repeats what it hears").await?;
    println!("✓ Registered bot {} (key {})", bot.id, bot.access_key);

    // Open a room. The room handle carries the user-side key.
    let room = client.create_room(&bot.id).await?;
    println!("✓ Opened room {} (key {})\n", room.id, room.access_key);

    // The user says something.
    room.write_text("hello there").await?;
    println!("user: hello there");

    // The bot peeks first; nothing is consumed yet.
    let pending = bot.read_messages(true).await?;
    println!("bot sees {} unread message(s)", pending.len());

    // Now consume and echo each message back into its room.
    let messages = bot.read_messages(false).await?;
    for message in &messages {
        let reply = MessageDraft::new(format!("you said: {}", message.text))
            .in_reply_to(&message.id);
        bot.room(&message.room_id).write_messages(&[reply]).await?;
        println!("bot: you said: {}", message.text);
    }

    // The user reads the echo; their unread set is the bot's output.
    let echoes = room.read_messages(false).await?;
    for echo in &echoes {
        println!("user received: {:?} (reply to {:?})", echo.text, echo.reply_to);
    }

    println!("\nExample completed successfully!");
    Ok(())
}
