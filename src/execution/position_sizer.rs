use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::exchange::SymbolMeta;
use crate::models::TakeProfitLeg;

/// How much quote-currency margin one signal commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizingMode {
    /// A fixed USDT amount per trade.
    Fixed(Decimal),
    /// A percentage (0-100] of the available futures balance.
    BalancePercent(Decimal),
}

impl SizingMode {
    /// Builds the configured mode. Unknown mode names and amounts outside
    /// their range are errors, never a silent fallback to fixed sizing.
    pub fn from_config(mode: &str, fixed_notional: Decimal, balance_pct: Decimal) -> Result<Self, String> {
        match mode.trim().to_lowercase().as_str() {
            "fixed" => {
                if fixed_notional <= Decimal::ZERO {
                    return Err(format!("fixed notional must be positive, got {fixed_notional}"));
                }
                Ok(SizingMode::Fixed(fixed_notional))
            }
            "balance_pct" | "percent" | "balance" => {
                if balance_pct <= Decimal::ZERO || balance_pct > Decimal::ONE_HUNDRED {
                    return Err(format!("balance percent {balance_pct} outside (0, 100]"));
                }
                Ok(SizingMode::BalancePercent(balance_pct))
            }
            other => Err(format!("unknown sizing mode {other:?}, expected fixed or balance_pct")),
        }
    }

    pub fn needs_balance(&self) -> bool {
        matches!(self, SizingMode::BalancePercent(_))
    }

    /// Margin to commit. `balance` is only read in percent mode. `None` on overflow.
    pub fn notional(&self, balance: Decimal) -> Option<Decimal> {
        match self {
            SizingMode::Fixed(amount) => Some(*amount),
            SizingMode::BalancePercent(pct) => balance.checked_mul(*pct)?.checked_div(Decimal::ONE_HUNDRED),
        }
    }
}

impl fmt::Display for SizingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingMode::Fixed(amount) => write!(f, "fixed {amount} USDT"),
            SizingMode::BalancePercent(pct) => write!(f, "{pct}% of balance"),
        }
    }
}

/// Front-loaded take-profit split: 50/20/15/10/5 percent.
pub fn default_tp_schedule() -> Vec<Decimal> {
    vec![
        Decimal::new(50, 2),
        Decimal::new(20, 2),
        Decimal::new(15, 2),
        Decimal::new(10, 2),
        Decimal::new(5, 2),
    ]
}

/// Every fraction must be in (0, 1] and the total must not exceed 1.
pub fn validate_schedule(schedule: &[Decimal]) -> Result<(), String> {
    if let Some(bad) = schedule
        .iter()
        .find(|f| **f <= Decimal::ZERO || **f > Decimal::ONE)
    {
        return Err(format!("take-profit fraction {bad} outside (0, 1]"));
    }
    let total: Decimal = schedule.iter().copied().sum();
    if total > Decimal::ONE {
        return Err(format!("take-profit fractions sum to {total}, above 1"));
    }
    Ok(())
}

/// `notional * leverage / price`, expressed in exchange units.
///
/// Leverage is applied before any rounding or minimum-size clamping.
/// Returns `None` for non-positive inputs or on overflow.
pub fn raw_quantity(
    notional: Decimal,
    leverage: u32,
    price: Decimal,
    contract_size: Decimal,
) -> Option<Decimal> {
    if notional <= Decimal::ZERO || leverage == 0 || price <= Decimal::ZERO || contract_size <= Decimal::ZERO {
        return None;
    }
    notional
        .checked_mul(Decimal::from(leverage))?
        .checked_div(price)?
        .checked_div(contract_size)
}

/// Floors to the lot step, then clamps up to the minimum size.
pub fn quantize(raw: Decimal, meta: &SymbolMeta) -> Option<Decimal> {
    Some(meta.floor_to_step(raw)?.max(meta.min_size))
}

/// Pairs targets with schedule fractions in order. A leg whose floored size
/// falls under the minimum is kept with size zero so the plan still shows it.
///
/// `None` when a target price cannot be rounded to the tick.
pub fn split_take_profits(
    quantity: Decimal,
    targets: &[Decimal],
    schedule: &[Decimal],
    meta: &SymbolMeta,
) -> Option<Vec<TakeProfitLeg>> {
    targets
        .iter()
        .zip(schedule)
        .map(|(price, fraction)| {
            let size = meta.floor_to_step(quantity.checked_mul(*fraction)?)?;
            let size = if size < meta.min_size { Decimal::ZERO } else { size };
            Some(TakeProfitLeg {
                price: meta.round_price(*price)?,
                fraction: *fraction,
                size,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
