pub mod auth;
pub mod bitget;
pub mod blofin;
pub mod http;
pub mod mexc;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{OrderIntent, TriggerOrder};

pub use auth::{AuthError, Credentials, DigestEncoding, PrehashLayout, SignRequest, Signer};
pub use bitget::BitgetClient;
pub use blofin::BlofinClient;
pub use mexc::MexcClient;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The exchange answered and declined. Never retried.
    #[error("rejected [{code}]: {message}")]
    Rejected { code: String, message: String },

    /// Network failure, timeout, 5xx, or an unreadable body.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        ExchangeError::Transport(e.to_string())
    }
}

impl ExchangeError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        ExchangeError::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ExchangeError::Transport(_))
    }
}

/// Trading rules for one contract. Effectively static, so cached per process.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolMeta {
    pub exchange_symbol: String,
    /// Order size increment, in exchange units.
    pub lot_step: Decimal,
    /// Smallest accepted order size, in exchange units.
    pub min_size: Decimal,
    /// Base-asset amount per exchange unit (1 when sizes are in coins).
    pub contract_size: Decimal,
    /// Price increment for trigger prices, when the exchange publishes one.
    pub price_step: Option<Decimal>,
}

impl SymbolMeta {
    /// Floors `size` to a multiple of `lot_step`. `None` when the result
    /// does not fit a `Decimal`.
    pub fn floor_to_step(&self, size: Decimal) -> Option<Decimal> {
        if self.lot_step <= Decimal::ZERO {
            return Some(size);
        }
        let steps = size.checked_div(self.lot_step)?.floor();
        Some(steps.checked_mul(self.lot_step)?.normalize())
    }

    /// Rounds `price` to the nearest tick. `None` on overflow.
    pub fn round_price(&self, price: Decimal) -> Option<Decimal> {
        match self.price_step {
            Some(step) if step > Decimal::ZERO => {
                let ticks = price.checked_div(step)?.round();
                Some(ticks.checked_mul(step)?.normalize())
            }
            _ => Some(price),
        }
    }
}

/// Whether stop-loss/take-profit go into the entry order or follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionMode {
    /// Submitted as separate reduce-only trigger orders after the entry fills.
    Separate,
    /// Sent as fields of the entry order itself.
    Embedded,
}

/// One exchange's REST surface, normalized.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn name(&self) -> &'static str;

    /// `BTCUSDT` → the exchange's own spelling.
    fn format_symbol(&self, symbol: &str) -> String;

    fn protection_mode(&self) -> ProtectionMode;

    async fn symbol_meta(&self, exchange_symbol: &str) -> Result<SymbolMeta, ExchangeError>;

    async fn last_price(&self, exchange_symbol: &str) -> Result<Decimal, ExchangeError>;

    /// Free quote-currency margin in the futures account.
    async fn available_balance(&self) -> Result<Decimal, ExchangeError>;

    /// Market entry with isolated margin at the intent's leverage. Returns the order id.
    async fn place_entry(&self, intent: &OrderIntent) -> Result<String, ExchangeError>;

    /// Stop-loss and take-profit carried as fields of the entry order
    /// itself. Empty for exchanges that take separate trigger orders.
    fn embedded_protection(&self, intent: &OrderIntent) -> Vec<TriggerOrder> {
        let _ = intent;
        Vec::new()
    }

    /// Reduce-only trigger order against the position opened by `intent`.
    async fn place_trigger(
        &self,
        intent: &OrderIntent,
        order: &TriggerOrder,
    ) -> Result<String, ExchangeError> {
        let _ = (intent, order);
        Err(ExchangeError::rejected(
            "unsupported",
            format!("{} does not take separate trigger orders", self.name()),
        ))
    }
}

/// Base asset of a `<BASE>USDT` symbol.
pub fn base_asset(symbol: &str) -> &str {
    symbol.strip_suffix(crate::parser::QUOTE_ASSET).unwrap_or(symbol)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Bitget,
    Blofin,
    Mexc,
}

impl ExchangeKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bitget" => Some(ExchangeKind::Bitget),
            "blofin" => Some(ExchangeKind::Blofin),
            "mexc" => Some(ExchangeKind::Mexc),
            _ => None,
        }
    }

    /// Builds the adapter. `base_url` overrides the production endpoint.
    pub fn connect(
        self,
        credentials: Credentials,
        timeout: Duration,
        base_url: Option<String>,
    ) -> Result<Arc<dyn Exchange>, reqwest::Error> {
        let client = http::build_client(timeout)?;
        let exchange: Arc<dyn Exchange> = match self {
            ExchangeKind::Bitget => Arc::new(BitgetClient::new(client, credentials, base_url)),
            ExchangeKind::Blofin => Arc::new(BlofinClient::new(client, credentials, base_url)),
            ExchangeKind::Mexc => Arc::new(MexcClient::new(client, credentials, base_url)),
        };
        Ok(exchange)
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Bitget => write!(f, "bitget"),
            ExchangeKind::Blofin => write!(f, "blofin"),
            ExchangeKind::Mexc => write!(f, "mexc"),
        }
    }
}
