pub mod freeform;
pub mod line;
pub mod patterns;
pub mod policy;

use crate::models::{Direction, EntryZone, TradeSignal};

use self::freeform::Fields;
use self::patterns::{SHORT_HINT, SYMBOL};

pub use policy::{validate, SignalPolicy};

/// Parser defaults applied when the message leaves a field out.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub default_leverage: u32,
    pub max_targets: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_leverage: 5,
            max_targets: 5,
        }
    }
}

/// Quote asset every recognised symbol must end with.
pub const QUOTE_ASSET: &str = "USDT";

/// Turns chat text into a [`TradeSignal`].
#[derive(Debug, Clone, Default)]
pub struct SignalParser {
    config: ParserConfig,
}

impl SignalParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Returns `None` when the text has no `<BASE>USDT` token; that is the
    /// only way to fail. Everything else is filled from whatever the text
    /// carries and judged later by [`policy::validate`].
    pub fn parse(&self, text: &str) -> Option<TradeSignal> {
        let upper = text.to_uppercase();

        let symbol = find_symbol(&upper)?;
        let mut signal = TradeSignal::new(symbol, self.config.default_leverage);

        if SHORT_HINT.is_match(&upper) {
            signal.direction = Direction::Short;
        }

        let non_empty_lines = upper.lines().filter(|l| !l.trim().is_empty()).count();
        let fields = if non_empty_lines > 1 {
            line::scan(&upper)
        } else {
            freeform::scan(&upper)
        };

        self.apply(&mut signal, fields);
        Some(signal)
    }

    fn apply(&self, signal: &mut TradeSignal, fields: Fields) {
        match fields.entry {
            Some(Ok((a, b))) => match EntryZone::new(a, b) {
                Some(zone) => signal.entry_zone = Some(zone),
                None => signal
                    .malformed
                    .push(format!("entry zone {a} - {b} is inverted or not positive")),
            },
            Some(Err(raw)) => signal
                .malformed
                .push(format!("entry price {raw} is not a valid number")),
            None => {}
        }

        match fields.stop {
            Some(Ok(stop)) => signal.stop_loss = Some(stop),
            Some(Err(raw)) => signal
                .malformed
                .push(format!("stop-loss {raw} is not a valid price")),
            None => {}
        }

        match fields.leverage {
            Some(Ok(leverage)) => signal.leverage = leverage,
            Some(Err(raw)) => signal
                .malformed
                .push(format!("leverage x{raw} is out of range")),
            None => {}
        }

        let candidates = fields.targets.unwrap_or_default();
        let total = candidates.len();
        signal.targets = candidates
            .into_iter()
            .filter(|t| signal.target_in_direction(*t))
            .take(self.config.max_targets)
            .collect();

        if signal.targets.len() < total.min(self.config.max_targets) {
            tracing::debug!(
                symbol = %signal.symbol,
                kept = signal.targets.len(),
                seen = total,
                "Dropped targets on the wrong side of the entry zone"
            );
        }
    }
}

/// First `<BASE>USDT` token, normalized to `BASEUSDT`.
fn find_symbol(upper: &str) -> Option<String> {
    upper.lines().find_map(|line| {
        SYMBOL
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|base| format!("{}{}", base.as_str(), QUOTE_ASSET))
    })
}
