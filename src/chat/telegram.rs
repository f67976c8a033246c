use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::{ChatEvent, StatusSink};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Extra headroom on top of the long-poll timeout before the request is abandoned.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("telegram {method} failed: {description}")]
    Api { method: String, description: String },
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub sender_chat: Option<Chat>,
    pub text: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
}

impl Update {
    /// Text-bearing messages and channel posts; everything else is `None`.
    pub fn into_event(self) -> Option<ChatEvent> {
        let message = self.message.or(self.channel_post)?;
        let text = message.text.or(message.caption)?;
        let author_id = message
            .from
            .map(|u| u.id)
            .or(message.sender_chat.map(|c| c.id))
            .unwrap_or(message.chat.id);

        Some(ChatEvent {
            channel_id: message.chat.id.to_string(),
            author_id: author_id.to_string(),
            text,
        })
    }
}

/// Telegram Bot API client: long-poll for messages, reply with statuses.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    bot_token: String,
    base_url: String,
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, bot_token: String) -> Self {
        Self {
            http,
            bot_token,
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<T, TelegramError> {
        let mut request = self.http.post(self.method_url(method)).json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let resp: ApiResponse<T> = request.send().await?.json().await?;
        match resp.result {
            Some(result) if resp.ok => Ok(result),
            _ => Err(TelegramError::Api {
                method: method.to_string(),
                description: resp.description.unwrap_or_else(|| "no result".into()),
            }),
        }
    }

    /// The bot's own account, used to ignore its own messages.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", json!({}), None).await
    }

    /// Long-polls for updates after `offset`, waiting up to `timeout_secs`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "channel_post"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        let timeout = Duration::from_secs(timeout_secs) + POLL_GRACE;
        self.call("getUpdates", body, Some(timeout)).await
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TelegramError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        let _: Value = self.call("sendMessage", body, None).await?;
        Ok(())
    }
}

#[async_trait]
impl StatusSink for TelegramClient {
    async fn send_status(&self, channel_id: &str, text: &str) {
        if let Err(e) = self.send_message(channel_id, text).await {
            tracing::warn!(error = %e, channel = channel_id, "Failed to send status message");
        }
    }
}
