use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::exchange::{Credentials, ExchangeKind};
use crate::execution::position_sizer::{self, SizingMode};
use crate::execution::{DispatchConfig, RetryPolicy};
use crate::parser::{ParserConfig, SignalPolicy};

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Chat
    pub telegram_bot_token: String,
    pub signal_chat_id: String,

    // Exchange
    pub exchange: ExchangeKind,
    pub exchange_api_key: String,
    pub exchange_api_secret: String,
    pub exchange_passphrase: Option<String>,
    pub exchange_base_url: Option<String>,
    pub http_timeout: Duration,

    // Sizing
    pub sizing: SizingMode,
    pub default_leverage: u32,
    pub max_leverage: u32,
    pub tp_schedule: Vec<Decimal>,

    // Policy
    pub require_stop_loss: bool,
    pub require_entry_zone: bool,

    // Retries
    pub transport_retries: u32,
    pub retry_delay: Duration,

    pub dry_run: bool,
    pub metrics_addr: Option<SocketAddr>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let exchange_raw = env::var("EXCHANGE").unwrap_or_else(|_| "bitget".into());
        let exchange = ExchangeKind::from_str(&exchange_raw)
            .ok_or_else(|| anyhow::anyhow!("EXCHANGE must be bitget, blofin or mexc, got {exchange_raw}"))?;

        let exchange_passphrase = env::var("EXCHANGE_PASSPHRASE")
            .ok()
            .filter(|s| !s.is_empty());
        if exchange != ExchangeKind::Mexc && exchange_passphrase.is_none() {
            anyhow::bail!("EXCHANGE_PASSPHRASE must be set for {exchange}");
        }

        let sizing = SizingMode::from_config(
            &env::var("SIZING_MODE").unwrap_or_else(|_| "fixed".into()),
            parse_var("NOTIONAL_USDT", Decimal::from(20))?,
            parse_var("BALANCE_PCT", Decimal::from(5))?,
        )
        .map_err(|e| anyhow::anyhow!("SIZING_MODE: {e}"))?;

        let tp_schedule = match env::var("TP_SCHEDULE") {
            Ok(raw) if !raw.trim().is_empty() => parse_schedule(&raw)?,
            _ => position_sizer::default_tp_schedule(),
        };

        let metrics_addr = match env::var("METRICS_ADDR") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse()?),
            _ => None,
        };

        Ok(Self {
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .map_err(|_| anyhow::anyhow!("TELEGRAM_BOT_TOKEN must be set"))?,
            signal_chat_id: env::var("SIGNAL_CHAT_ID")
                .map_err(|_| anyhow::anyhow!("SIGNAL_CHAT_ID must be set"))?,

            exchange,
            exchange_api_key: env::var("EXCHANGE_API_KEY")
                .map_err(|_| anyhow::anyhow!("EXCHANGE_API_KEY must be set"))?,
            exchange_api_secret: env::var("EXCHANGE_API_SECRET")
                .map_err(|_| anyhow::anyhow!("EXCHANGE_API_SECRET must be set"))?,
            exchange_passphrase,
            exchange_base_url: env::var("EXCHANGE_BASE_URL").ok().filter(|s| !s.is_empty()),
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", 10)?),

            sizing,
            default_leverage: parse_var("DEFAULT_LEVERAGE", 5)?,
            max_leverage: parse_var("MAX_LEVERAGE", 125)?,
            tp_schedule,

            require_stop_loss: parse_var("REQUIRE_STOP_LOSS", false)?,
            require_entry_zone: parse_var("REQUIRE_ENTRY_ZONE", false)?,

            transport_retries: parse_var("TRANSPORT_RETRIES", 2)?,
            retry_delay: Duration::from_millis(parse_var("RETRY_DELAY_MS", 3_000)?),

            dry_run: parse_var("DRY_RUN", false)?,
            metrics_addr,
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.exchange_api_key.clone(),
            api_secret: self.exchange_api_secret.clone(),
            passphrase: self.exchange_passphrase.clone(),
        }
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            default_leverage: self.default_leverage,
            max_targets: self.tp_schedule.len(),
        }
    }

    pub fn signal_policy(&self) -> SignalPolicy {
        SignalPolicy {
            require_stop_loss: self.require_stop_loss,
            require_entry_zone: self.require_entry_zone,
            max_leverage: self.max_leverage,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            sizing: self.sizing,
            tp_schedule: self.tp_schedule.clone(),
            retry: RetryPolicy::new(self.transport_retries, self.retry_delay),
            dry_run: self.dry_run,
        }
    }
}

/// Reads `key`, falling back to `default` when unset or empty.
fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}={raw} is invalid: {e}")),
        _ => Ok(default),
    }
}

/// Comma-separated fractions, e.g. `0.5,0.3,0.2`.
pub fn parse_schedule(raw: &str) -> anyhow::Result<Vec<Decimal>> {
    let schedule = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Decimal::from_str(s).map_err(|e| anyhow::anyhow!("TP_SCHEDULE entry {s} is invalid: {e}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if schedule.is_empty() {
        anyhow::bail!("TP_SCHEDULE is empty");
    }
    position_sizer::validate_schedule(&schedule).map_err(|e| anyhow::anyhow!("TP_SCHEDULE: {e}"))?;
    Ok(schedule)
}
