//! The one required-field policy applied to every parsed signal.

use rust_decimal::Decimal;

use crate::errors::TradeError;
use crate::models::{Direction, TradeSignal};

#[derive(Debug, Clone)]
pub struct SignalPolicy {
    /// Reject signals without a stop-loss.
    pub require_stop_loss: bool,
    /// Reject signals without an entry zone instead of falling back to a live quote.
    pub require_entry_zone: bool,
    pub max_leverage: u32,
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self {
            require_stop_loss: false,
            require_entry_zone: false,
            max_leverage: 125,
        }
    }
}

/// Symbol presence is guaranteed by the parser. This checks the rest:
/// zone ordering, leverage bounds, stop placement, and the optional
/// required fields.
pub fn validate(signal: &TradeSignal, policy: &SignalPolicy) -> Result<(), TradeError> {
    if !signal.malformed.is_empty() {
        return Err(TradeError::Validation(signal.malformed.join("; ")));
    }

    if signal.leverage == 0 || signal.leverage > policy.max_leverage {
        return Err(TradeError::Validation(format!(
            "leverage x{} outside 1..={}",
            signal.leverage, policy.max_leverage
        )));
    }

    if policy.require_entry_zone && signal.entry_zone.is_none() {
        return Err(TradeError::Validation("missing entry zone".into()));
    }

    match signal.stop_loss {
        None if policy.require_stop_loss => {
            return Err(TradeError::Validation("missing stop-loss".into()));
        }
        Some(stop) if stop <= Decimal::ZERO => {
            return Err(TradeError::Validation(format!("stop-loss {stop} is not positive")));
        }
        Some(stop) => {
            if let Some(zone) = signal.entry_zone {
                let wrong_side = match signal.direction {
                    Direction::Long => stop >= zone.low,
                    Direction::Short => stop <= zone.high,
                };
                if wrong_side {
                    return Err(TradeError::Validation(format!(
                        "stop-loss {stop} is on the wrong side of entry {} - {} for a {}",
                        zone.low, zone.high, signal.direction
                    )));
                }
            }
        }
        None => {}
    }

    Ok(())
}
