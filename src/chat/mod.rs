pub mod listener;
pub mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramClient;

/// One text message seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub channel_id: String,
    /// Sending user, or the posting chat for anonymous channel posts.
    pub author_id: String,
    pub text: String,
}

/// Where per-message status replies go.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Best effort. Failures are logged by the implementation.
    async fn send_status(&self, channel_id: &str, text: &str);
}
