use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use super::telegram::TelegramClient;
use super::ChatEvent;

const LONG_POLL_SECS: u64 = 30;
const BASE_RECONNECT_DELAY: Duration = Duration::from_secs(2);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Delay before the poll following `attempt` consecutive failures.
pub fn backoff_delay(attempt: u32) -> Duration {
    let delay = BASE_RECONNECT_DELAY * 2u32.saturating_pow(attempt.min(16));
    delay.min(MAX_RECONNECT_DELAY)
}

/// Long-poll Telegram forever, forwarding text messages to `tx`.
///
/// Returns when the receiving side of `tx` is dropped.
pub async fn run_listener(client: Arc<TelegramClient>, tx: mpsc::Sender<ChatEvent>) {
    let mut offset: Option<i64> = None;
    let mut attempt: u32 = 0;

    tracing::info!("Chat listener started");

    loop {
        match client.get_updates(offset, LONG_POLL_SECS).await {
            Ok(updates) => {
                attempt = 0;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    let Some(event) = update.into_event() else {
                        continue;
                    };
                    tracing::debug!(
                        channel = %event.channel_id,
                        author = %event.author_id,
                        "Message received"
                    );
                    if tx.send(event).await.is_err() {
                        tracing::warn!("Chat event channel closed, listener stopping");
                        return;
                    }
                }
            }
            Err(e) => {
                let delay = backoff_delay(attempt);
                attempt = attempt.saturating_add(1);
                tracing::error!(
                    error = %e,
                    delay_secs = delay.as_secs(),
                    attempt,
                    "getUpdates failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
