use rust_decimal::Decimal;

/// Failures of the per-message pipeline after a symbol was recognised.
///
/// A message without a symbol never produces one of these; the parser simply
/// returns `None`.
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    #[error("invalid signal: {0}")]
    Validation(String),

    #[error("no price available for {symbol}: {reason}")]
    PriceUnavailable { symbol: String, reason: String },

    #[error("computed order size for {symbol} is not tradable (quantity {quantity})")]
    UntradableSize { symbol: String, quantity: Decimal },

    #[error("exchange rejected order [{code}]: {message}")]
    Rejected { code: String, message: String },

    #[error("exchange unreachable after {attempts} attempt(s): {cause}")]
    Transport { attempts: u32, cause: String },
}

impl TradeError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TradeError::Validation(_) => "validation",
            TradeError::PriceUnavailable { .. } => "price_unavailable",
            TradeError::UntradableSize { .. } => "untradable_size",
            TradeError::Rejected { .. } => "rejected",
            TradeError::Transport { .. } => "transport",
        }
    }
}
