//! Botline - Message relay for bots and their users
//!
//! Main entry point for the botline CLI.

use botline::config::BotlineConfig;
use botline::server::RelayServer;
use botline_client::Client;
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
use std::process;

/// Botline - Store-and-forward message relay between bots and their users
#[derive(Parser, Debug)]
#[command(name = "botline")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/botline/config.yaml)
    #[arg(short, long)]
    config: Option<String>,

    /// Base URL of the relay server, for the read and write commands
    #[arg(short, long, default_value = botline_client::DEFAULT_BASE_URL)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Listen address (default: from config, 127.0.0.1:8000)
        addr: Option<String>,
    },

    /// Read a room's pending messages
    Read {
        /// Bot ID
        bot: String,

        /// Room ID; omit to read across all of the bot's rooms (bot key only)
        room: Option<String>,

        /// Access key (bot or room key)
        #[arg(short = 'k', long, env = "BOTLINE_ACCESS_KEY")]
        access_key: String,

        /// Peek without marking messages read; pass --peek=false to consume
        #[arg(
            short,
            long,
            default_value_t = true,
            action = ArgAction::Set,
            num_args = 0..=1,
            default_missing_value = "true"
        )]
        peek: bool,
    },

    /// Write a message into a room
    Write {
        /// Bot ID
        bot: String,

        /// Room ID
        room: String,

        /// Message text
        text: String,

        /// Access key (bot or room key)
        #[arg(short = 'k', long, env = "BOTLINE_ACCESS_KEY")]
        access_key: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize logging
    if let Err(e) = botline::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> botline::Result<()> {
    match cli.command {
        Commands::Serve { addr } => {
            let config = if let Some(config_path) = cli.config {
                BotlineConfig::load(config_path)?
            } else {
                BotlineConfig::load_or_default()?
            };

            let addr = addr.unwrap_or_else(|| config.server.listen_addr.clone());
            tracing::info!(database = %config.database.path.display(), "Configuration loaded");

            let server = RelayServer::new(config.database.path, config.mailbox.allow_replies)?;
            server.run(&addr).await?;
        }

        Commands::Read {
            bot,
            room,
            access_key,
            peek,
        } => {
            let client = Client::new(cli.server).with_access_key(access_key);

            let messages = match room {
                Some(room) => client.room(bot, room).read_messages(peek).await?,
                None => client.bot(bot).read_messages(peek).await?,
            };

            for message in &messages {
                let stamp = message.created_at.with_timezone(&Local).format("%-I:%M%p");
                println!("[{}] {}", stamp, message.text);
            }
        }

        Commands::Write {
            bot,
            room,
            text,
            access_key,
        } => {
            let client = Client::new(cli.server).with_access_key(access_key);
            client.room(bot, room).write_text(text).await?;
        }
    }

    Ok(())
}
