use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;
use crate::exchange::ExchangeError;

/// Details of an order the exchange accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub order_id: String,
    pub exchange_symbol: String,
    pub side: Side,
    pub size: Decimal,
    pub reference_price: Decimal,
}

/// Normalized result of one submission attempt sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Placed(Placement),
    /// The exchange understood the request and declined it.
    Rejected { code: String, message: String },
    /// Network error, timeout, or an unreadable response.
    TransportFailure(String),
}

impl Outcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, Outcome::Placed(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Outcome::TransportFailure(_))
    }

    pub fn from_result(result: Result<Placement, ExchangeError>) -> Self {
        match result {
            Ok(placement) => Outcome::Placed(placement),
            Err(ExchangeError::Rejected { code, message }) => Outcome::Rejected { code, message },
            Err(ExchangeError::Transport(cause)) => Outcome::TransportFailure(cause),
        }
    }
}
