//! HTTP server for the Botline relay API
//!
//! Exposes the mailbox engine over REST. One header, `X-Access-Key`, carries
//! the caller's capability; the access resolver turns it into a role before
//! any mailbox operation runs.
//!
//! # Routes
//!
//! - `GET /health` - Liveness check
//! - `POST /v1/bots` - Register a bot (response includes the key, once)
//! - `GET /v1/bots` - List bots, keys stripped
//! - `GET /v1/bots/{bot}/messages` - Fan-in read across the bot's rooms (`?peek=bool`)
//! - `POST /v1/bots/{bot}/rooms` - Open a room (response includes the key, once)
//! - `GET /v1/bots/{bot}/rooms` - List a bot's rooms, keys stripped
//! - `GET /v1/bots/{bot}/rooms/{room}/messages` - Read one room's mailbox (`?peek=bool`)
//! - `POST /v1/bots/{bot}/rooms/{room}/messages` - Send a batch of messages
//!
//! # Example
//!
//! ```no_run
//! use botline::server::RelayServer;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = RelayServer::new(PathBuf::from("botline.db"), true)
//!         .expect("Failed to create server");
//!
//!     server.run("127.0.0.1:8000").await.expect("Server failed");
//! }
//! ```

use crate::mailbox::{
    Bot, BotId, MailboxEngine, MailboxStore, Message, MessageDraft, MessageId, ResolvedAccess,
    Room, RoomId,
};
use crate::{BotlineError, Result};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Header carrying the caller's access key
pub const ACCESS_KEY_HEADER: &str = "X-Access-Key";

/// Shared server state
struct AppState {
    engine: Mutex<MailboxEngine>,
}

/// HTTP server for the relay API
pub struct RelayServer {
    state: Arc<AppState>,
}

impl RelayServer {
    /// Create a server over the database at the given path
    pub fn new(db_path: PathBuf, allow_replies: bool) -> Result<Self> {
        let store = MailboxStore::open(db_path)?;
        let engine = MailboxEngine::new(store, allow_replies);
        Ok(Self {
            state: Arc::new(AppState {
                engine: Mutex::new(engine),
            }),
        })
    }

    /// Build the router
    fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/v1/bots", post(create_bot).get(list_bots))
            .route("/v1/bots/{bot}/messages", get(read_bot_messages))
            .route("/v1/bots/{bot}/rooms", post(create_room).get(list_rooms))
            .route(
                "/v1/bots/{bot}/rooms/{room}/messages",
                get(read_room_messages).post(write_room_messages),
            )
            .with_state(state)
    }

    /// The router backed by this server's state, for embedding or testing
    pub fn app(&self) -> Router {
        Self::router(self.state.clone())
    }

    /// Run the server on the given address
    pub async fn run(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(addr = addr, "Botline server listening");

        axum::serve(listener, Self::router(self.state)).await?;
        Ok(())
    }

    /// Get a reference to the engine (for testing)
    pub fn engine(&self) -> &Mutex<MailboxEngine> {
        &self.state.engine
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Map a failure to its status code and body
///
/// Internal failures are logged and replaced with a generic body; every other
/// kind carries its own description.
fn error_response(err: BotlineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        BotlineError::Validation(_) => StatusCode::BAD_REQUEST,
        BotlineError::Unauthorized => StatusCode::UNAUTHORIZED,
        BotlineError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Request failed");
        "internal server error".to_string()
    } else {
        err.to_string()
    };

    (status, Json(ErrorResponse { message }))
}

/// Request to register a bot
#[derive(Debug, Deserialize)]
pub struct CreateBotRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// DTO for a bot
///
/// The access key is present only in the creation response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotDto {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    pub created_at: String,
}

impl From<&Bot> for BotDto {
    fn from(bot: &Bot) -> Self {
        Self {
            id: bot.id.as_str().to_string(),
            name: bot.name.clone(),
            description: bot.description.clone(),
            access_key: None,
            created_at: bot.created_at.to_rfc3339(),
        }
    }
}

impl BotDto {
    /// Include the freshly issued key; only the creation response does this
    fn revealing_key(bot: &Bot) -> Self {
        Self {
            access_key: Some(bot.access_key.clone()),
            ..Self::from(bot)
        }
    }
}

/// DTO for a room
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDto {
    pub id: String,
    #[serde(rename = "botID")]
    pub bot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    pub created_at: String,
}

impl From<&Room> for RoomDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            bot_id: room.bot_id.as_str().to_string(),
            access_key: None,
            created_at: room.created_at.to_rfc3339(),
        }
    }
}

impl RoomDto {
    /// Include the freshly issued key; only the creation response does this
    fn revealing_key(room: &Room) -> Self {
        Self {
            access_key: Some(room.access_key.clone()),
            ..Self::from(room)
        }
    }
}

/// DTO for a message
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "type")]
    pub direction: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub created_at: String,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            id: message.id.as_str().to_string(),
            room_id: message.room_id.as_str().to_string(),
            direction: message.direction.as_str().to_string(),
            text: message.text,
            reply_to: message.reply_to.map(|id| id.as_str().to_string()),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// Response listing bots
#[derive(Debug, Serialize)]
pub struct BotsResponse {
    pub bots: Vec<BotDto>,
}

/// Response listing rooms
#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomDto>,
}

/// Response carrying messages
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageDto>,
}

/// One message in a write request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// Request to send a batch of messages
#[derive(Debug, Deserialize)]
pub struct WriteMessagesRequest {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

/// Read query parameters
#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    /// Read without consuming; absent means consume
    #[serde(default)]
    pub peek: bool,
}

/// Extract the access key header, if any
fn access_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCESS_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_bot(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBotRequest>,
) -> std::result::Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let engine = state.engine.lock().await;
    let bot = engine
        .create_bot(&req.name, &req.description)
        .map_err(error_response)?;

    Ok(Json(BotDto::revealing_key(&bot)))
}

async fn list_bots(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let engine = state.engine.lock().await;
    let bots = engine.list_bots().map_err(error_response)?;

    Ok(Json(BotsResponse {
        bots: bots.iter().map(BotDto::from).collect(),
    }))
}

async fn read_bot_messages(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<String>,
    Query(query): Query<ReadQuery>,
    headers: HeaderMap,
) -> std::result::Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let bot_id = BotId::from_string(bot_id);
    let key = access_key(&headers);

    let engine = state.engine.lock().await;
    let access = ResolvedAccess::resolve(engine.store(), &bot_id, None, key.as_deref())
        .map_err(error_response)?;
    let messages = engine
        .deliver_for_bot(&bot_id, access.role, query.peek)
        .map_err(error_response)?;

    Ok(Json(MessagesResponse {
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

async fn create_room(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<String>,
) -> std::result::Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let engine = state.engine.lock().await;
    let room = engine
        .create_room(&BotId::from_string(bot_id))
        .map_err(error_response)?;

    Ok(Json(RoomDto::revealing_key(&room)))
}

async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Path(bot_id): Path<String>,
) -> std::result::Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let engine = state.engine.lock().await;
    let rooms = engine
        .list_rooms(&BotId::from_string(bot_id))
        .map_err(error_response)?;

    Ok(Json(RoomsResponse {
        rooms: rooms.iter().map(RoomDto::from).collect(),
    }))
}

async fn read_room_messages(
    State(state): State<Arc<AppState>>,
    Path((bot_id, room_id)): Path<(String, String)>,
    Query(query): Query<ReadQuery>,
    headers: HeaderMap,
) -> std::result::Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let bot_id = BotId::from_string(bot_id);
    let room_id = RoomId::from_string(room_id);
    let key = access_key(&headers);

    let engine = state.engine.lock().await;
    let access = ResolvedAccess::resolve(engine.store(), &bot_id, Some(&room_id), key.as_deref())
        .map_err(error_response)?;
    let messages = engine
        .deliver(&room_id, access.role, query.peek)
        .map_err(error_response)?;

    Ok(Json(MessagesResponse {
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

async fn write_room_messages(
    State(state): State<Arc<AppState>>,
    Path((bot_id, room_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<WriteMessagesRequest>,
) -> std::result::Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let bot_id = BotId::from_string(bot_id);
    let room_id = RoomId::from_string(room_id);
    let key = access_key(&headers);

    let drafts: Vec<MessageDraft> = req
        .messages
        .into_iter()
        .map(|m| MessageDraft {
            text: m.text,
            reply_to: m.reply_to.map(MessageId::from_string),
        })
        .collect();

    let mut engine = state.engine.lock().await;
    let access = ResolvedAccess::resolve(engine.store(), &bot_id, Some(&room_id), key.as_deref())
        .map_err(error_response)?;
    let stored = engine
        .send(&room_id, access.role, &drafts)
        .map_err(error_response)?;

    Ok(Json(MessagesResponse {
        messages: stored.into_iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn create_test_server() -> (Router, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("botline.db");
        let server = RelayServer::new(db_path, true).unwrap();
        (server.app(), temp_dir)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _temp) = create_test_server();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_bot_reveals_key_once() {
        let (app, _temp) = create_test_server();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/bots")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"name":"greeter","description":"hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bot = body_json(response).await;
        assert_eq!(bot["name"], "greeter");
        let key = bot["accessKey"].as_str().unwrap().to_string();
        assert!(!key.is_empty());

        // The listing must not reveal it again
        let response = app
            .oneshot(Request::builder().uri("/v1/bots").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listing = body_json(response).await;
        assert_eq!(listing["bots"].as_array().unwrap().len(), 1);
        assert!(listing["bots"][0].get("accessKey").is_none());
    }

    #[tokio::test]
    async fn test_create_bot_requires_name() {
        let (app, _temp) = create_test_server();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/bots")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"description":"nameless"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn test_unknown_bot_is_not_found() {
        let (app, _temp) = create_test_server();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/bots/deadbeef/rooms")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_read_without_key_is_unauthorized() {
        let (app, _temp) = create_test_server();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/bots")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"name":"greeter","description":""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bot = body_json(response).await;
        let bot_id = bot["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/bots/{}/messages", bot_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
