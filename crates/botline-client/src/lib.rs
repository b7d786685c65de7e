//! Botline API client
//!
//! A typed interface to a Botline relay server for bot authors and user-side
//! tooling. Every conversation lives in a room owned by a bot; possession of
//! an access key is what makes the caller "the bot" or "the user of this
//! room", so the handles returned here carry their key and attach it to each
//! request.
//!
//! # Example
//!
//! ```no_run
//! use botline_client::Client;
//!
//! # async fn run() -> botline_client::Result<()> {
//! let client = Client::new("http://localhost:8000");
//!
//! // Register a bot and open a room for one user conversation.
//! let bot = client.create_bot("greeter", "says hello").await?;
//! let room = client.create_room(&bot.id).await?;
//!
//! // The bot polls without consuming, then reads for real.
//! let pending = bot.read_messages(true).await?;
//! if !pending.is_empty() {
//!     let _ = bot.read_messages(false).await?;
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default server URL used by [`Client::default`].
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Header carrying the caller's access key.
pub const ACCESS_KEY_HEADER: &str = "X-Access-Key";

/// Errors returned by the client
#[derive(Debug, Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// A bot as reported by the server
///
/// `access_key` is only present in the response to [`Client::create_bot`];
/// listing endpoints strip it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub access_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A room as reported by the server
///
/// `access_key` identifies the user side of the room and is only present in
/// the response to [`Client::create_room`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    #[serde(rename = "botID")]
    pub bot_id: String,
    #[serde(default)]
    pub access_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Produced by the bot, addressed to the user side
    Bot,
    /// Produced by the user, addressed to the bot side
    User,
}

impl Direction {
    /// The wire name, `"bot"` or `"user"`
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bot => "bot",
            Direction::User => "user",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message as reported by the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub text: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message to be sent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl MessageDraft {
    /// Create a draft with just text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_to: None,
        }
    }

    /// Mark this draft as a reply to an earlier message in the same room
    pub fn in_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct BotsEnvelope {
    bots: Vec<Bot>,
}

#[derive(Debug, Deserialize)]
struct RoomsEnvelope {
    rooms: Vec<Room>,
}

#[derive(Debug, Deserialize)]
struct MessagesEnvelope {
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Botline API client
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    access_key: Option<String>,
    http: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Client {
    /// Create a client for the given server, e.g. `http://localhost:8000`
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            access_key: None,
            http: reqwest::Client::new(),
        }
    }

    /// Set the access key attached to handles created via [`Client::bot`]
    /// and [`Client::room`]
    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    /// List all bots registered on the server (keys are never included)
    pub async fn list_bots(&self) -> Result<Vec<Bot>> {
        let url = format!("{}/v1/bots", self.base_url);
        let response = self.http.get(&url).send().await?;
        let body: BotsEnvelope = check(response).await?.json().await?;
        Ok(body.bots)
    }

    /// Register a new bot
    ///
    /// The returned handle carries the freshly issued bot key. The server
    /// never reveals it again, so persist it somewhere safe.
    pub async fn create_bot(&self, name: &str, description: &str) -> Result<BotHandle> {
        let url = format!("{}/v1/bots", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "name": name, "description": description }))
            .send()
            .await?;
        let bot: Bot = check(response).await?.json().await?;
        Ok(BotHandle {
            client: self.clone(),
            access_key: bot.access_key.clone().unwrap_or_default(),
            id: bot.id,
        })
    }

    /// Handle for an existing bot, authenticated with this client's key
    pub fn bot(&self, id: impl Into<String>) -> BotHandle {
        BotHandle {
            client: self.clone(),
            access_key: self.access_key.clone().unwrap_or_default(),
            id: id.into(),
        }
    }

    /// Open a new room under a bot
    ///
    /// The returned handle carries the room's user-side key, issued exactly
    /// once.
    pub async fn create_room(&self, bot_id: &str) -> Result<RoomHandle> {
        let url = format!("{}/v1/bots/{}/rooms", self.base_url, bot_id);
        let response = self.http.post(&url).send().await?;
        let room: Room = check(response).await?.json().await?;
        Ok(RoomHandle {
            client: self.clone(),
            access_key: room.access_key.clone().unwrap_or_default(),
            bot_id: room.bot_id,
            id: room.id,
        })
    }

    /// List a bot's rooms (keys are never included)
    pub async fn list_rooms(&self, bot_id: &str) -> Result<Vec<Room>> {
        let url = format!("{}/v1/bots/{}/rooms", self.base_url, bot_id);
        let response = self.http.get(&url).send().await?;
        let body: RoomsEnvelope = check(response).await?.json().await?;
        Ok(body.rooms)
    }

    /// Handle for an existing room, authenticated with this client's key
    pub fn room(&self, bot_id: impl Into<String>, id: impl Into<String>) -> RoomHandle {
        RoomHandle {
            client: self.clone(),
            access_key: self.access_key.clone().unwrap_or_default(),
            bot_id: bot_id.into(),
            id: id.into(),
        }
    }

    async fn read_messages(&self, url: String, access_key: &str, peek: bool) -> Result<Vec<Message>> {
        let mut request = self.http.get(&url).header(ACCESS_KEY_HEADER, access_key);
        if peek {
            request = request.query(&[("peek", "true")]);
        }
        let response = request.send().await?;
        let body: MessagesEnvelope = check(response).await?.json().await?;
        Ok(body.messages)
    }
}

/// Decode the server's error body on a non-success status
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

/// The bot side of the API: fan-in reads across all of the bot's rooms
#[derive(Debug, Clone)]
pub struct BotHandle {
    client: Client,
    /// The bot's secret key
    pub access_key: String,
    /// The bot's id
    pub id: String,
}

impl BotHandle {
    /// List this bot's rooms
    pub async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.client.list_rooms(&self.id).await
    }

    /// Read unread user messages across all of this bot's rooms
    ///
    /// With `peek` the messages stay unread; without it they are consumed and
    /// will not be returned again.
    pub async fn read_messages(&self, peek: bool) -> Result<Vec<Message>> {
        let url = format!("{}/v1/bots/{}/messages", self.client.base_url, self.id);
        self.client.read_messages(url, &self.access_key, peek).await
    }

    /// Handle for one of this bot's rooms, using the bot's key
    pub fn room(&self, room_id: impl Into<String>) -> RoomHandle {
        RoomHandle {
            client: self.client.clone(),
            access_key: self.access_key.clone(),
            bot_id: self.id.clone(),
            id: room_id.into(),
        }
    }
}

/// One room's mailbox, usable from either side depending on the key
#[derive(Debug, Clone)]
pub struct RoomHandle {
    client: Client,
    /// Key presented on reads and writes; decides which side this handle is
    pub access_key: String,
    /// Owning bot id
    pub bot_id: String,
    /// Room id
    pub id: String,
}

impl RoomHandle {
    /// Read unread messages addressed to this handle's side of the room
    pub async fn read_messages(&self, peek: bool) -> Result<Vec<Message>> {
        let url = format!(
            "{}/v1/bots/{}/rooms/{}/messages",
            self.client.base_url, self.bot_id, self.id
        );
        self.client.read_messages(url, &self.access_key, peek).await
    }

    /// Send a batch of messages into the room
    ///
    /// The server tags each message with the direction implied by the key;
    /// drafts cannot claim a side.
    pub async fn write_messages(&self, drafts: &[MessageDraft]) -> Result<Vec<Message>> {
        let url = format!(
            "{}/v1/bots/{}/rooms/{}/messages",
            self.client.base_url, self.bot_id, self.id
        );
        let response = self
            .client
            .http
            .post(&url)
            .header(ACCESS_KEY_HEADER, &self.access_key)
            .json(&serde_json::json!({ "messages": drafts }))
            .send()
            .await?;
        let body: MessagesEnvelope = check(response).await?.json().await?;
        Ok(body.messages)
    }

    /// Send a single text message
    pub async fn write_text(&self, text: impl Into<String>) -> Result<Vec<Message>> {
        self.write_messages(&[MessageDraft::new(text)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimming() {
        let client = Client::new("http://localhost:8000///");
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_handles_inherit_access_key() {
        let client = Client::new(DEFAULT_BASE_URL).with_access_key("kb");
        let bot = client.bot("b1");
        assert_eq!(bot.access_key, "kb");

        let room = bot.room("r1");
        assert_eq!(room.access_key, "kb");
        assert_eq!(room.bot_id, "b1");

        let user_room = client.room("b1", "r1");
        assert_eq!(user_room.access_key, "kb");
    }

    #[test]
    fn test_message_decoding() {
        let json = r#"{
            "id": "m1",
            "roomID": "r1",
            "type": "user",
            "text": "hi",
            "createdAt": "2024-05-01T12:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.direction, Direction::User);
        assert_eq!(msg.reply_to, None);

        let json = r#"{
            "id": "m2",
            "roomID": "r1",
            "type": "bot",
            "text": "hello",
            "replyTo": "m1",
            "createdAt": "2024-05-01T12:00:01Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.direction, Direction::Bot);
        assert_eq!(msg.reply_to.as_deref(), Some("m1"));
    }

    #[test]
    fn test_draft_serialization() {
        let draft = MessageDraft::new("hi");
        let json = serde_json::to_string(&draft).unwrap();
        assert_eq!(json, r#"{"text":"hi"}"#);

        let reply = MessageDraft::new("and you?").in_reply_to("m1");
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains(r#""replyTo":"m1""#));
    }
}
