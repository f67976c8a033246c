use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::chat::{ChatEvent, StatusSink};
use crate::execution::Dispatcher;
use crate::parser::{validate, SignalParser, SignalPolicy};

use super::notifier;

/// Posted when processing a message panicked, so the channel is never left without a reply.
pub const INTERNAL_ERROR_STATUS: &str = "Signal could not be processed: internal error";

/// Per-message pipeline: parse, validate, dispatch, report.
pub struct SignalHandler {
    parser: SignalParser,
    policy: SignalPolicy,
    dispatcher: Dispatcher,
    channel_id: String,
    /// The bot's own author id; its messages are never treated as signals.
    self_id: Option<String>,
}

impl SignalHandler {
    pub fn new(
        parser: SignalParser,
        policy: SignalPolicy,
        dispatcher: Dispatcher,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            parser,
            policy,
            dispatcher,
            channel_id: channel_id.into(),
            self_id: None,
        }
    }

    pub fn with_self_id(mut self, self_id: impl Into<String>) -> Self {
        self.self_id = Some(self_id.into());
        self
    }

    /// Only the configured channel, never the bot itself.
    pub fn accepts(&self, event: &ChatEvent) -> bool {
        event.channel_id == self.channel_id
            && self.self_id.as_deref() != Some(event.author_id.as_str())
    }

    /// Runs one message through the pipeline and returns the status to post.
    ///
    /// `None` means stay quiet: the message was filtered out or carried no
    /// recognisable symbol. Every other failure becomes a status string.
    pub async fn handle(&self, event: &ChatEvent) -> Option<String> {
        if !self.accepts(event) {
            return None;
        }
        counter!("signals_received").increment(1);

        let Some(signal) = self.parser.parse(&event.text) else {
            tracing::debug!(author = %event.author_id, "No signal in message");
            return None;
        };
        counter!("signals_parsed").increment(1);

        tracing::info!(
            symbol = %signal.symbol,
            direction = %signal.direction,
            leverage = signal.leverage,
            has_zone = signal.entry_zone.is_some(),
            has_stop = signal.stop_loss.is_some(),
            targets = signal.targets.len(),
            "Signal parsed"
        );

        if let Err(e) = validate(&signal, &self.policy) {
            counter!("signals_invalid").increment(1);
            tracing::warn!(symbol = %signal.symbol, error = %e, "Signal failed validation");
            return Some(notifier::format_failure(&signal, &e));
        }

        match self.dispatcher.dispatch(&signal).await {
            Ok(execution) => Some(notifier::format_execution(
                &signal,
                &execution,
                self.dispatcher.exchange_name(),
            )),
            Err(e) => {
                tracing::warn!(
                    symbol = %signal.symbol,
                    kind = e.kind(),
                    error = %e,
                    "Signal not traded"
                );
                Some(notifier::format_failure(&signal, &e))
            }
        }
    }

    /// Consumes chat events until the channel closes, one task per message so
    /// a slow exchange call never holds up the next signal. Waits for
    /// in-flight messages before returning.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<ChatEvent>, sink: Arc<dyn StatusSink>) {
        tracing::info!(
            channel = %self.channel_id,
            exchange = self.dispatcher.exchange_name(),
            dry_run = self.dispatcher.config().dry_run,
            "Signal handler started"
        );

        let mut tasks = JoinSet::new();

        while let Some(event) = rx.recv().await {
            while let Some(done) = tasks.try_join_next() {
                log_task_panic(done);
            }

            if !self.accepts(&event) {
                continue;
            }

            let handler = Arc::clone(&self);
            let sink = Arc::clone(&sink);
            tasks.spawn(async move {
                let channel_id = event.channel_id.clone();
                // inner task isolates a panic so the reply still goes out
                let status = match tokio::spawn(async move { handler.handle(&event).await }).await {
                    Ok(status) => status,
                    Err(e) => {
                        log_task_panic(Err(e));
                        Some(INTERNAL_ERROR_STATUS.to_string())
                    }
                };
                if let Some(status) = status {
                    sink.send_status(&channel_id, &status).await;
                }
            });
        }

        while let Some(done) = tasks.join_next().await {
            log_task_panic(done);
        }
        tracing::warn!("Chat event channel closed, signal handler stopped");
    }
}

fn log_task_panic(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Signal task aborted");
    }
}
