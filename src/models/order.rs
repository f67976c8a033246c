use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Side;

/// A sized, exchange-ready order derived from a [`super::TradeSignal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Generic symbol as parsed, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Exchange-specific symbol, e.g. `BTC_USDT` or `BTC-USDT`.
    pub exchange_symbol: String,
    pub side: Side,
    /// Quote-currency margin committed before leverage.
    pub notional_amount: Decimal,
    /// Size in exchange units (contracts or base coin).
    pub quantity: Decimal,
    pub leverage: u32,
    pub reference_price: Decimal,
    pub take_profit_plan: Vec<TakeProfitLeg>,
    pub stop_loss_price: Option<Decimal>,
    /// Reused across retries so a duplicate submission is refused upstream.
    pub client_oid: String,
}

impl OrderIntent {
    /// Trigger orders in submission order: stop first, then targets.
    pub fn trigger_orders(&self) -> Vec<TriggerOrder> {
        let mut orders = Vec::with_capacity(self.take_profit_plan.len() + 1);

        if let Some(price) = self.stop_loss_price {
            orders.push(TriggerOrder {
                kind: TriggerKind::StopLoss,
                trigger_price: price,
                size: self.quantity,
            });
        }

        orders.extend(
            self.take_profit_plan
                .iter()
                .filter(|leg| leg.size > Decimal::ZERO)
                .map(|leg| TriggerOrder {
                    kind: TriggerKind::TakeProfit,
                    trigger_price: leg.price,
                    size: leg.size,
                }),
        );

        orders
    }
}

/// One take-profit level and the share of the position it closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitLeg {
    pub price: Decimal,
    pub fraction: Decimal,
    /// Floored to the lot step; zero when the slice fell under the minimum size.
    pub size: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    StopLoss,
    TakeProfit,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::StopLoss => write!(f, "SL"),
            TriggerKind::TakeProfit => write!(f, "TP"),
        }
    }
}

/// A reduce-only trigger order placed against an open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerOrder {
    pub kind: TriggerKind,
    pub trigger_price: Decimal,
    pub size: Decimal,
}
