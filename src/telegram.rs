//! Telegram integration for jokebot
//!
//! Talks to the Bot API directly over HTTPS. Inbound updates arrive either
//! through the webhook server or through long polling; both feed
//! [`Handlers::handle_update`].

use crate::error::{BotError, Result};
use crate::handlers::Handlers;
use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Per-request timeout for regular Bot API calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;
const POLL_ERROR_BACKOFF_SECS: u64 = 5;
/// Bot API description for an edit that would leave the message as it is.
const NOT_MODIFIED: &str = "message is not modified";

/// Telegram Update object (Telegram Bot API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<CallbackQuery>,
}

/// Telegram User object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// Telegram Chat object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

/// Telegram Message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub date: i64,
    pub text: Option<String>,
}

/// Telegram CallbackQuery object, sent when an inline button is pressed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub message: Option<TelegramMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Outbound chat operations the bot needs.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()>;

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()>;

    async fn answer_callback(&self, callback_id: &str) -> Result<()>;
}

/// Telegram Bot API client
pub struct TelegramClient {
    api_url: String,
    http: reqwest::Client,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Self {
        Self::with_api_base(TELEGRAM_API_BASE, bot_token)
    }

    pub fn with_api_base(base: &str, bot_token: &str) -> Self {
        Self {
            api_url: format!("{}/bot{}", base.trim_end_matches('/'), bot_token),
            http: reqwest::Client::new(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{}", self.api_url, method))
            .json(payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| BotError::Telegram {
                message: format!("{} request failed: {}", method, e.without_url()),
            })?;

        let status = response.status();
        let body: ApiResponse<T> = response.json().await.map_err(|e| BotError::Telegram {
            message: format!("{} returned unreadable response ({}): {}", method, status, e),
        })?;

        if !body.ok {
            return Err(BotError::Telegram {
                message: format!(
                    "{} failed: {}",
                    method,
                    body.description.unwrap_or_else(|| status.to_string())
                ),
            });
        }

        body.result.ok_or_else(|| BotError::Telegram {
            message: format!("{} returned no result", method),
        })
    }

    /// Register `url` as the webhook target.
    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        let _: bool = self
            .call(
                "setWebhook",
                &serde_json::json!({
                    "url": url,
                    "allowed_updates": ["message", "callback_query"],
                }),
                Duration::from_secs(REQUEST_TIMEOUT_SECS),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self
            .call(
                "deleteWebhook",
                &serde_json::json!({}),
                Duration::from_secs(REQUEST_TIMEOUT_SECS),
            )
            .await?;
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<TelegramUpdate>> {
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"],
            }),
            timeout + Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
        .await
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut payload = serde_json::json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = markup {
            payload["reply_markup"] = serde_json::to_value(markup)?;
        }

        let _: serde_json::Value = self
            .call(
                "sendMessage",
                &payload,
                Duration::from_secs(REQUEST_TIMEOUT_SECS),
            )
            .await?;
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let mut payload = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(markup) = markup {
            payload["reply_markup"] = serde_json::to_value(markup)?;
        }

        let edited: Result<serde_json::Value> = self
            .call(
                "editMessageText",
                &payload,
                Duration::from_secs(REQUEST_TIMEOUT_SECS),
            )
            .await;
        match edited {
            Ok(_) => Ok(()),
            Err(BotError::Telegram { message }) if message.contains(NOT_MODIFIED) => {
                debug!(chat_id, message_id, "Message already shows this text");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &serde_json::json!({ "callback_query_id": callback_id }),
                Duration::from_secs(REQUEST_TIMEOUT_SECS),
            )
            .await?;
        Ok(())
    }
}

/// Build the webhook router. Updates are processed off the request path so
/// Telegram gets its 200 immediately.
pub fn webhook_router(handlers: Arc<Handlers>, webhook_path: &str) -> Router {
    Router::new()
        .route(&format!("/{}", webhook_path), post(handle_telegram_webhook))
        .route("/health", get(health_check))
        .with_state(handlers)
}

/// Start webhook server
pub async fn start_webhook_server(
    handlers: Arc<Handlers>,
    addr: SocketAddr,
    webhook_path: &str,
) -> Result<()> {
    let app = webhook_router(handlers, webhook_path);

    info!("Starting Telegram webhook server on {}", addr);

    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| BotError::Telegram {
                message: format!("Failed to bind to {}: {}", addr, e),
            })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| BotError::Telegram {
            message: format!("Webhook server error: {}", e),
        })?;

    Ok(())
}

/// Run the long-polling loop until the task is dropped.
pub async fn run_polling(
    client: Arc<TelegramClient>,
    handlers: Arc<Handlers>,
    poll_timeout: Duration,
) -> Result<()> {
    info!(timeout = ?poll_timeout, "Polling Telegram for updates");
    let mut offset = 0;

    loop {
        let updates = match client.get_updates(offset, poll_timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed: {}", e);
                sleep(Duration::from_secs(POLL_ERROR_BACKOFF_SECS)).await;
                continue;
            }
        };

        for update in updates {
            offset = next_offset(offset, &update);
            let handlers = handlers.clone();
            tokio::spawn(async move {
                if let Err(e) = handlers.handle_update(&update).await {
                    error!(update_id = update.update_id, "Failed to handle telegram update: {}", e);
                }
            });
        }
    }
}

// Webhook handler
async fn handle_telegram_webhook(
    State(handlers): State<Arc<Handlers>>,
    Json(update): Json<TelegramUpdate>,
) -> &'static str {
    debug!(update_id = update.update_id, "Webhook update received");
    tokio::spawn(async move {
        if let Err(e) = handlers.handle_update(&update).await {
            error!(update_id = update.update_id, "Failed to handle telegram update: {}", e);
        }
    });
    "OK"
}

async fn health_check() -> &'static str {
    "OK"
}

// Helper functions

/// Offset to acknowledge everything up to and including `update`.
pub fn next_offset(current: i64, update: &TelegramUpdate) -> i64 {
    current.max(update.update_id + 1)
}

/// Extract the bot command name from message text: `/start@JokeBot x` -> `start`.
pub fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    let name = command.split('@').next().unwrap_or(command);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Full webhook URL from the public base and the route path.
pub fn webhook_endpoint(base_url: &str, webhook_path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), webhook_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Selector;
    use crate::store::JsonStore;
    use crate::test_support::{CyclingSource, Outbound, RecordingMessenger};
    use httpmock::prelude::*;

    async fn serve_router(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_parse_telegram_update() {
        let json = r#"{
            "update_id": 123,
            "message": {
                "message_id": 456,
                "from": {"id": 789, "is_bot": false, "first_name": "Test"},
                "chat": {"id": 789, "type": "private"},
                "date": 1234567890,
                "text": "/start"
            }
        }"#;

        let update: TelegramUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.update_id, 123);
        assert!(update.message.is_some());
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_parse_callback_update() {
        let json = r#"{
            "update_id": 124,
            "callback_query": {
                "id": "cbq-1",
                "from": {"id": 789, "is_bot": false, "first_name": "Test"},
                "message": {
                    "message_id": 456,
                    "chat": {"id": 789, "type": "private"},
                    "date": 1234567890,
                    "text": "😂 old joke"
                },
                "chat_instance": "42",
                "data": "another_joke"
            }
        }"#;

        let update: TelegramUpdate = serde_json::from_str(json).unwrap();
        let query = update.callback_query.unwrap();
        assert_eq!(query.id, "cbq-1");
        assert_eq!(query.data.as_deref(), Some("another_joke"));
        assert_eq!(query.message.unwrap().message_id, 456);
    }

    #[test]
    fn test_keyboard_serialization_skips_empty_fields() {
        let markup = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![
                InlineKeyboardButton::callback("More", "another_joke"),
                InlineKeyboardButton::url("Site", "https://example.com/"),
            ]],
        };
        let value = serde_json::to_value(&markup).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "inline_keyboard": [[
                    {"text": "More", "callback_data": "another_joke"},
                    {"text": "Site", "url": "https://example.com/"}
                ]]
            })
        );
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some("start"));
        assert_eq!(parse_command("/start@JokeBot"), Some("start"));
        assert_eq!(parse_command("/start deep-link"), Some("start"));
        assert_eq!(parse_command("start"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_next_offset() {
        let update: TelegramUpdate =
            serde_json::from_str(r#"{"update_id": 10}"#).unwrap();
        assert_eq!(next_offset(0, &update), 11);
        assert_eq!(next_offset(20, &update), 20);
    }

    #[test]
    fn test_webhook_endpoint() {
        assert_eq!(
            webhook_endpoint("https://bot.example.com/", "webhook"),
            "https://bot.example.com/webhook"
        );
    }

    #[tokio::test]
    async fn send_message_posts_text_and_keyboard() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/bottoken/sendMessage")
                .json_body(serde_json::json!({
                    "chat_id": 42,
                    "text": "😂 hi",
                    "reply_markup": {
                        "inline_keyboard": [[{"text": "More", "callback_data": "another_joke"}]]
                    }
                }));
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": {"message_id": 1}}));
        });

        let client = TelegramClient::with_api_base(&server.base_url(), "token");
        let markup = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton::callback("More", "another_joke")]],
        };
        client.send_message(42, "😂 hi", Some(&markup)).await.unwrap();
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn api_error_description_is_surfaced() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/bottoken/sendMessage");
            then.status(403).json_body(serde_json::json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            }));
        });

        let client = TelegramClient::with_api_base(&server.base_url(), "token");
        let err = client.send_message(7, "x", None).await.unwrap_err();
        assert!(err.to_string().contains("bot was blocked by the user"));
    }

    #[tokio::test]
    async fn edit_and_answer_use_expected_methods() {
        let server = MockServer::start_async().await;
        let edit = server.mock(|when, then| {
            when.method(POST)
                .path("/bottoken/editMessageText")
                .json_body(serde_json::json!({
                    "chat_id": 5,
                    "message_id": 9,
                    "text": "new"
                }));
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": {"message_id": 9}}));
        });
        let answer = server.mock(|when, then| {
            when.method(POST)
                .path("/bottoken/answerCallbackQuery")
                .json_body(serde_json::json!({"callback_query_id": "cb"}));
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": true}));
        });

        let client = TelegramClient::with_api_base(&server.base_url(), "token");
        client.edit_message(5, 9, "new", None).await.unwrap();
        client.answer_callback("cb").await.unwrap();
        edit.assert_calls(1);
        answer.assert_calls(1);
    }

    #[tokio::test]
    async fn edit_with_unchanged_text_is_not_an_error() {
        let server = MockServer::start_async().await;
        let edit = server.mock(|when, then| {
            when.method(POST).path("/bottoken/editMessageText");
            then.status(400).json_body(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same as a current content and reply markup of the message"
            }));
        });

        let client = TelegramClient::with_api_base(&server.base_url(), "token");
        client.edit_message(5, 9, "same", None).await.unwrap();
        edit.assert_calls(1);
    }

    #[tokio::test]
    async fn edit_failure_is_still_reported() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/bottoken/editMessageText");
            then.status(400).json_body(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message to edit not found"
            }));
        });

        let client = TelegramClient::with_api_base(&server.base_url(), "token");
        let err = client.edit_message(5, 9, "new", None).await.unwrap_err();
        assert!(err.to_string().contains("message to edit not found"));
    }

    #[tokio::test]
    async fn get_updates_parses_results() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/bottoken/getUpdates");
            then.status(200).json_body(serde_json::json!({
                "ok": true,
                "result": [
                    {"update_id": 3, "message": {
                        "message_id": 1,
                        "from": {"id": 11, "is_bot": false, "first_name": "A"},
                        "chat": {"id": 11, "type": "private"},
                        "date": 0,
                        "text": "/start"
                    }}
                ]
            }));
        });

        let client = TelegramClient::with_api_base(&server.base_url(), "token");
        let updates = client.get_updates(0, Duration::from_secs(0)).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 3);
    }

    #[tokio::test]
    async fn set_webhook_sends_url() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/bottoken/setWebhook")
                .json_body(serde_json::json!({
                    "url": "https://bot.example.com/webhook",
                    "allowed_updates": ["message", "callback_query"]
                }));
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "result": true, "description": "Webhook was set"}));
        });

        let client = TelegramClient::with_api_base(&server.base_url(), "token");
        client
            .set_webhook("https://bot.example.com/webhook")
            .await
            .unwrap();
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn webhook_server_answers_health_and_dispatches_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(
            dir.path().join("users.json"),
            dir.path().join("used_jokes.json"),
        ));
        let messenger = Arc::new(RecordingMessenger::default());
        let selector = Selector::new(Arc::new(CyclingSource::new(&["served"])), store);
        let handlers = Arc::new(Handlers::new(selector, messenger.clone(), "https://example.com/"));
        let addr = serve_router(webhook_router(handlers, "hook")).await;
        let http = reqwest::Client::new();

        let health = http
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();
        assert!(health.status().is_success());
        assert_eq!(health.text().await.unwrap(), "OK");

        let response = http
            .post(format!("http://{}/hook", addr))
            .json(&serde_json::json!({
                "update_id": 1,
                "message": {
                    "message_id": 10,
                    "from": {"id": 64, "is_bot": false, "first_name": "T"},
                    "chat": {"id": 64, "type": "private"},
                    "date": 0,
                    "text": "/start"
                }
            }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(response.text().await.unwrap(), "OK");

        // The update is handled off the request path.
        let mut calls = Vec::new();
        for _ in 0..100 {
            calls = messenger.calls();
            if !calls.is_empty() {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert!(matches!(
            calls.as_slice(),
            [Outbound::Sent { chat_id: 64, .. }]
        ));
    }

    #[tokio::test]
    async fn webhook_server_rejects_malformed_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(
            dir.path().join("users.json"),
            dir.path().join("used_jokes.json"),
        ));
        let messenger = Arc::new(RecordingMessenger::default());
        let selector = Selector::new(Arc::new(CyclingSource::new(&["x"])), store);
        let handlers = Arc::new(Handlers::new(selector, messenger.clone(), "https://example.com/"));
        let addr = serve_router(webhook_router(handlers, "hook")).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/hook", addr))
            .json(&serde_json::json!({ "not": "an update" }))
            .send()
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert!(messenger.calls().is_empty());
    }
}
