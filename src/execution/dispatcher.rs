use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::TradeError;
use crate::exchange::{Exchange, ExchangeError, ProtectionMode};
use crate::models::{OrderIntent, Outcome, Placement, Side, TradeSignal, TriggerOrder};

use super::metadata_cache::SymbolMetaCache;
use super::position_sizer::{self, SizingMode};
use super::retry::RetryPolicy;

/// Order id reported for entries that were sized but not sent.
pub const DRY_RUN_ORDER_ID: &str = "dry-run";

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub sizing: SizingMode,
    /// Fraction of the position closed at each target, in target order.
    pub tp_schedule: Vec<Decimal>,
    pub retry: RetryPolicy,
    /// Size orders and report them without submitting anything.
    pub dry_run: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sizing: SizingMode::Fixed(Decimal::from(20)),
            tp_schedule: position_sizer::default_tp_schedule(),
            retry: RetryPolicy::default(),
            dry_run: false,
        }
    }
}

/// What happened to one signal on the exchange.
#[derive(Debug, Clone)]
pub struct Execution {
    pub intent: OrderIntent,
    pub entry: Placement,
    /// Separate trigger orders in submission order, each with its own outcome.
    /// Empty when protection rides on the entry order or in dry-run mode.
    pub protection: Vec<(TriggerOrder, Outcome)>,
    /// Protection sent as fields of the entry order, when the exchange embeds it.
    pub attached: Vec<TriggerOrder>,
    pub protection_mode: ProtectionMode,
    pub dry_run: bool,
}

impl Execution {
    pub fn failed_triggers(&self) -> usize {
        self.protection
            .iter()
            .filter(|(_, outcome)| !outcome.is_placed())
            .count()
    }
}

/// Turns validated signals into orders on one exchange.
#[derive(Clone)]
pub struct Dispatcher {
    exchange: Arc<dyn Exchange>,
    cache: SymbolMetaCache,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(exchange: Arc<dyn Exchange>, config: DispatchConfig) -> Self {
        Self {
            exchange,
            cache: SymbolMetaCache::new(),
            config,
        }
    }

    pub fn with_cache(mut self, cache: SymbolMetaCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn exchange_name(&self) -> &'static str {
        self.exchange.name()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn cache(&self) -> &SymbolMetaCache {
        &self.cache
    }

    /// Reference price: the entry-zone midpoint, else the live ticker.
    pub async fn resolve_price(
        &self,
        signal: &TradeSignal,
        exchange_symbol: &str,
    ) -> Result<Decimal, TradeError> {
        if let Some(zone) = &signal.entry_zone {
            return Ok(zone.midpoint());
        }

        let exchange = self.exchange.as_ref();
        let price = self
            .config
            .retry
            .run("last_price", || exchange.last_price(exchange_symbol))
            .await
            .map_err(|e| TradeError::PriceUnavailable {
                symbol: signal.symbol.clone(),
                reason: e.to_string(),
            })?;

        if price <= Decimal::ZERO {
            return Err(TradeError::PriceUnavailable {
                symbol: signal.symbol.clone(),
                reason: format!("ticker returned {price}"),
            });
        }
        Ok(price)
    }

    /// Sizes `signal` into an exchange-ready intent. Sends nothing.
    pub async fn build_intent(&self, signal: &TradeSignal) -> Result<OrderIntent, TradeError> {
        let exchange = self.exchange.as_ref();
        let retry = &self.config.retry;
        let exchange_symbol = exchange.format_symbol(&signal.symbol);

        let reference_price = self.resolve_price(signal, &exchange_symbol).await?;

        let meta = self
            .cache
            .get_or_fetch(exchange, &exchange_symbol, retry)
            .await
            .map_err(|e| self.trade_error(e))?;

        let balance = if self.config.sizing.needs_balance() {
            retry
                .run("available_balance", || exchange.available_balance())
                .await
                .map_err(|e| self.trade_error(e))?
        } else {
            Decimal::ZERO
        };
        let notional = self
            .config
            .sizing
            .notional(balance)
            .ok_or_else(|| TradeError::UntradableSize {
                symbol: signal.symbol.clone(),
                quantity: Decimal::ZERO,
            })?;

        let out_of_range = |price: Decimal| {
            TradeError::Validation(format!("price {price} is out of range for {}", signal.symbol))
        };
        // sent unrounded, but a price past the tick range is refused
        if meta.round_price(reference_price).is_none() {
            return Err(out_of_range(reference_price));
        }

        let raw = position_sizer::raw_quantity(
            notional,
            signal.leverage,
            reference_price,
            meta.contract_size,
        )
        .ok_or_else(|| TradeError::UntradableSize {
            symbol: signal.symbol.clone(),
            quantity: Decimal::ZERO,
        })?;

        let quantity = position_sizer::quantize(raw, &meta).ok_or_else(|| TradeError::UntradableSize {
            symbol: signal.symbol.clone(),
            quantity: raw,
        })?;
        if quantity <= Decimal::ZERO {
            return Err(TradeError::UntradableSize {
                symbol: signal.symbol.clone(),
                quantity,
            });
        }

        let take_profit_plan = position_sizer::split_take_profits(
            quantity,
            &signal.targets,
            &self.config.tp_schedule,
            &meta,
        )
        .ok_or_else(|| {
            TradeError::Validation(format!("take-profit target out of range for {}", signal.symbol))
        })?;

        let stop_loss_price = signal
            .stop_loss
            .map(|p| meta.round_price(p).ok_or_else(|| out_of_range(p)))
            .transpose()?;

        tracing::debug!(
            symbol = %signal.symbol,
            notional = %notional,
            leverage = signal.leverage,
            price = %reference_price,
            raw = %raw,
            quantity = %quantity,
            "Sized order"
        );

        Ok(OrderIntent {
            symbol: signal.symbol.clone(),
            exchange_symbol,
            side: Side::from(signal.direction),
            notional_amount: notional,
            quantity,
            leverage: signal.leverage,
            reference_price,
            take_profit_plan,
            stop_loss_price,
            client_oid: Uuid::new_v4().simple().to_string(),
        })
    }

    /// Sizes and submits the entry, then any separate trigger orders.
    ///
    /// Triggers are only attempted once the entry is confirmed, in order:
    /// stop first, then targets. A failed trigger does not undo the entry.
    /// Latency is recorded for every outcome, failures included.
    pub async fn dispatch(&self, signal: &TradeSignal) -> Result<Execution, TradeError> {
        let start = Instant::now();
        let result = self.execute(signal).await;
        histogram!("dispatch_latency_seconds").record(start.elapsed().as_secs_f64());
        result
    }

    async fn execute(&self, signal: &TradeSignal) -> Result<Execution, TradeError> {
        let intent = self.build_intent(signal).await?;
        let protection_mode = self.exchange.protection_mode();
        let attached = self.exchange.embedded_protection(&intent);

        if self.config.dry_run {
            tracing::info!(
                symbol = %intent.exchange_symbol,
                side = %intent.side,
                quantity = %intent.quantity,
                leverage = intent.leverage,
                "Dry run, order not submitted"
            );
            let entry = Placement {
                order_id: DRY_RUN_ORDER_ID.to_string(),
                exchange_symbol: intent.exchange_symbol.clone(),
                side: intent.side,
                size: intent.quantity,
                reference_price: intent.reference_price,
            };
            return Ok(Execution {
                intent,
                entry,
                protection: Vec::new(),
                attached,
                protection_mode,
                dry_run: true,
            });
        }

        let exchange = self.exchange.as_ref();
        let intent_ref = &intent;
        let entry = self
            .config
            .retry
            .run("place_entry", || exchange.place_entry(intent_ref))
            .await
            .map(|order_id| Placement {
                order_id,
                exchange_symbol: intent.exchange_symbol.clone(),
                side: intent.side,
                size: intent.quantity,
                reference_price: intent.reference_price,
            });

        let entry = match Outcome::from_result(entry) {
            Outcome::Placed(placement) => placement,
            Outcome::Rejected { code, message } => {
                counter!("orders_rejected").increment(1);
                tracing::warn!(
                    exchange = exchange.name(),
                    symbol = %intent.exchange_symbol,
                    code = %code,
                    message = %message,
                    "Entry order rejected"
                );
                return Err(TradeError::Rejected { code, message });
            }
            Outcome::TransportFailure(cause) => {
                counter!("orders_transport_failed").increment(1);
                tracing::error!(
                    exchange = exchange.name(),
                    symbol = %intent.exchange_symbol,
                    attempts = self.config.retry.max_attempts(),
                    error = %cause,
                    "Entry order failed"
                );
                return Err(TradeError::Transport {
                    attempts: self.config.retry.max_attempts(),
                    cause,
                });
            }
        };

        counter!("orders_placed").increment(1);
        tracing::info!(
            exchange = exchange.name(),
            order_id = %entry.order_id,
            symbol = %intent.exchange_symbol,
            side = %intent.side,
            quantity = %intent.quantity,
            leverage = intent.leverage,
            "Entry order placed"
        );

        let protection = match protection_mode {
            ProtectionMode::Separate => self.place_triggers(&intent).await,
            ProtectionMode::Embedded => Vec::new(),
        };

        Ok(Execution {
            intent,
            entry,
            protection,
            attached,
            protection_mode,
            dry_run: false,
        })
    }

    async fn place_triggers(&self, intent: &OrderIntent) -> Vec<(TriggerOrder, Outcome)> {
        let exchange = self.exchange.as_ref();
        let mut results = Vec::new();

        for order in intent.trigger_orders() {
            let order_ref = &order;
            let result = self
                .config
                .retry
                .run("place_trigger", || exchange.place_trigger(intent, order_ref))
                .await
                .map(|order_id| Placement {
                    order_id,
                    exchange_symbol: intent.exchange_symbol.clone(),
                    side: intent.side.opposite(),
                    size: order.size,
                    reference_price: order.trigger_price,
                });

            let outcome = Outcome::from_result(result);
            match &outcome {
                Outcome::Placed(p) => {
                    counter!("trigger_orders_placed").increment(1);
                    tracing::info!(
                        kind = %order.kind,
                        order_id = %p.order_id,
                        price = %order.trigger_price,
                        size = %order.size,
                        "Trigger order placed"
                    );
                }
                Outcome::Rejected { code, message } => {
                    tracing::warn!(
                        kind = %order.kind,
                        price = %order.trigger_price,
                        code = %code,
                        message = %message,
                        "Trigger order rejected"
                    );
                }
                Outcome::TransportFailure(cause) => {
                    tracing::warn!(
                        kind = %order.kind,
                        price = %order.trigger_price,
                        error = %cause,
                        "Trigger order failed"
                    );
                }
            }
            results.push((order, outcome));
        }

        results
    }

    fn trade_error(&self, e: ExchangeError) -> TradeError {
        match e {
            ExchangeError::Rejected { code, message } => TradeError::Rejected { code, message },
            ExchangeError::Transport(cause) => TradeError::Transport {
                attempts: self.config.retry.max_attempts(),
                cause,
            },
        }
    }
}
