pub mod http_stub;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use signal_trader::chat::{ChatEvent, StatusSink};
use signal_trader::exchange::{Exchange, ExchangeError, ProtectionMode, SymbolMeta};
use signal_trader::execution::{DispatchConfig, Dispatcher, RetryPolicy, SizingMode};
use signal_trader::models::{OrderIntent, TriggerKind, TriggerOrder};

pub const CHANNEL: &str = "-100123";
pub const BOT_ID: &str = "999";

/// Scripted in-process exchange. Each queue is consumed one response per
/// call; an empty queue falls back to success.
pub struct FakeExchange {
    pub mode: ProtectionMode,
    pub meta: SymbolMeta,
    pub balance: Decimal,
    ticker: Mutex<VecDeque<Result<Decimal, ExchangeError>>>,
    entries: Mutex<VecDeque<Result<String, ExchangeError>>>,
    triggers: Mutex<VecDeque<Result<String, ExchangeError>>>,
    /// Entries for this exchange symbol wait this long before answering.
    slow_entry: Option<(String, Duration)>,

    pub ticker_calls: AtomicU32,
    pub meta_calls: AtomicU32,
    pub entry_calls: AtomicU32,
    pub submitted_entries: Mutex<Vec<OrderIntent>>,
    pub submitted_triggers: Mutex<Vec<TriggerOrder>>,
}

#[allow(dead_code)]
impl FakeExchange {
    pub fn new() -> Self {
        Self {
            mode: ProtectionMode::Separate,
            meta: SymbolMeta {
                exchange_symbol: "BTCUSDT".into(),
                lot_step: Decimal::new(1, 3),
                min_size: Decimal::new(1, 3),
                contract_size: Decimal::ONE,
                price_step: Some(Decimal::new(1, 1)),
            },
            balance: Decimal::from(1_000),
            ticker: Mutex::new(VecDeque::new()),
            entries: Mutex::new(VecDeque::new()),
            triggers: Mutex::new(VecDeque::new()),
            slow_entry: None,
            ticker_calls: AtomicU32::new(0),
            meta_calls: AtomicU32::new(0),
            entry_calls: AtomicU32::new(0),
            submitted_entries: Mutex::new(Vec::new()),
            submitted_triggers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_mode(mut self, mode: ProtectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ticker(self, responses: Vec<Result<Decimal, ExchangeError>>) -> Self {
        *self.ticker.lock().unwrap() = responses.into();
        self
    }

    pub fn with_entries(self, responses: Vec<Result<String, ExchangeError>>) -> Self {
        *self.entries.lock().unwrap() = responses.into();
        self
    }

    pub fn with_triggers(self, responses: Vec<Result<String, ExchangeError>>) -> Self {
        *self.triggers.lock().unwrap() = responses.into();
        self
    }

    pub fn with_slow_entry(mut self, exchange_symbol: &str, delay: Duration) -> Self {
        self.slow_entry = Some((exchange_symbol.to_string(), delay));
        self
    }

    pub fn entry_count(&self) -> u32 {
        self.entry_calls.load(Ordering::SeqCst)
    }

    pub fn trigger_orders(&self) -> Vec<TriggerOrder> {
        self.submitted_triggers.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exchange for FakeExchange {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn format_symbol(&self, symbol: &str) -> String {
        symbol.to_string()
    }

    fn protection_mode(&self) -> ProtectionMode {
        self.mode
    }

    /// Same shape as MEXC: the stop and the first target, each for the full size.
    fn embedded_protection(&self, intent: &OrderIntent) -> Vec<TriggerOrder> {
        if self.mode != ProtectionMode::Embedded {
            return Vec::new();
        }
        let stop = intent.stop_loss_price.map(|price| TriggerOrder {
            kind: TriggerKind::StopLoss,
            trigger_price: price,
            size: intent.quantity,
        });
        let target = intent.take_profit_plan.first().map(|leg| TriggerOrder {
            kind: TriggerKind::TakeProfit,
            trigger_price: leg.price,
            size: intent.quantity,
        });
        stop.into_iter().chain(target).collect()
    }

    async fn symbol_meta(&self, exchange_symbol: &str) -> Result<SymbolMeta, ExchangeError> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SymbolMeta {
            exchange_symbol: exchange_symbol.to_string(),
            ..self.meta.clone()
        })
    }

    async fn last_price(&self, _exchange_symbol: &str) -> Result<Decimal, ExchangeError> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        self.ticker
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Decimal::from(50_000)))
    }

    async fn available_balance(&self) -> Result<Decimal, ExchangeError> {
        Ok(self.balance)
    }

    async fn place_entry(&self, intent: &OrderIntent) -> Result<String, ExchangeError> {
        if let Some((symbol, delay)) = &self.slow_entry {
            if *symbol == intent.exchange_symbol {
                tokio::time::sleep(*delay).await;
            }
        }
        let n = self.entry_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted_entries.lock().unwrap().push(intent.clone());
        self.entries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("entry-{}", n + 1)))
    }

    async fn place_trigger(
        &self,
        _intent: &OrderIntent,
        order: &TriggerOrder,
    ) -> Result<String, ExchangeError> {
        let mut submitted = self.submitted_triggers.lock().unwrap();
        submitted.push(*order);
        let n = submitted.len();
        drop(submitted);
        self.triggers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("trigger-{n}")))
    }
}

/// Collects every status message instead of posting it.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn send_status(&self, channel_id: &str, text: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
    }
}

/// Default dispatch settings with the production retry count but no delay.
#[allow(dead_code)]
pub fn test_config() -> DispatchConfig {
    DispatchConfig {
        sizing: SizingMode::Fixed(Decimal::from(20)),
        retry: RetryPolicy::new(2, Duration::ZERO),
        ..DispatchConfig::default()
    }
}

#[allow(dead_code)]
pub fn dispatcher(exchange: Arc<FakeExchange>, config: DispatchConfig) -> Dispatcher {
    Dispatcher::new(exchange, config)
}

#[allow(dead_code)]
pub fn event(text: &str) -> ChatEvent {
    ChatEvent {
        channel_id: CHANNEL.into(),
        author_id: "42".into(),
        text: text.into(),
    }
}
