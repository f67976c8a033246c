use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Direction;

/// Acceptable price range for opening a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryZone {
    pub low: Decimal,
    pub high: Decimal,
}

impl EntryZone {
    /// Returns `None` when the bounds are inverted or not strictly positive.
    pub fn new(low: Decimal, high: Decimal) -> Option<Self> {
        if low <= Decimal::ZERO || high <= Decimal::ZERO || low > high {
            return None;
        }
        Some(Self { low, high })
    }

    /// Written as `low + (high - low) / 2` so bounds near `Decimal::MAX` cannot overflow.
    pub fn midpoint(&self) -> Decimal {
        self.low + (self.high - self.low) / Decimal::TWO
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.low && price <= self.high
    }
}

/// A trade intent extracted from a chat message.
///
/// Only `symbol` is guaranteed; every other field is whatever the message
/// carried. Whether a missing field is fatal is decided by
/// [`crate::parser::policy::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// Base + quote, uppercase, e.g. `BTCUSDT`.
    pub symbol: String,
    pub direction: Direction,
    pub entry_zone: Option<EntryZone>,
    pub stop_loss: Option<Decimal>,
    /// Take-profit levels in the order they appeared.
    pub targets: Vec<Decimal>,
    pub leverage: u32,
    /// Fields the message carried with unusable values (inverted zone,
    /// zero bound, leverage past `u32`). Validation rejects the signal
    /// instead of falling back to a default.
    #[serde(default)]
    pub malformed: Vec<String>,
}

impl TradeSignal {
    pub fn new(symbol: impl Into<String>, leverage: u32) -> Self {
        Self {
            symbol: symbol.into(),
            direction: Direction::Long,
            entry_zone: None,
            stop_loss: None,
            targets: Vec::new(),
            leverage,
            malformed: Vec::new(),
        }
    }

    /// True when `target` lies on the profitable side of the entry zone.
    /// Without a zone every positive target is accepted.
    pub fn target_in_direction(&self, target: Decimal) -> bool {
        if target <= Decimal::ZERO {
            return false;
        }
        match (self.entry_zone, self.direction) {
            (None, _) => true,
            (Some(zone), Direction::Long) => target > zone.high,
            (Some(zone), Direction::Short) => target < zone.low,
        }
    }
}
