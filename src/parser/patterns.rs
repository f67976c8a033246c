//! Keyword patterns shared by the line and free-form scanners.
//!
//! All patterns run against uppercased text.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

const NUM: &str = r"(\d+(?:\.\d+)?)";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

/// `BTCUSDT`, `BTC/USDT`, `#BTC_USDT`, `$PEPE-USDT`.
pub static SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:^|[^A-Z0-9])[#$]?([0-9]*[A-Z][A-Z0-9]*?)[/_\-]?USDT(?:[^A-Z0-9]|$)"));

pub static SHORT_HINT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?:SHORT|SELL|SELLZONE|SELL ZONE)\b"));

pub static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"\b(?:BUY ?ZONE|SELL ?ZONE|ENTRY(?: ZONE| PRICE)?)\b\s*:?\s*{NUM}(?:\s*(?:-|–|—|TO)\s*{NUM})?"
    ))
});

pub static STOP: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(r"\b(?:STOP[ \-]?LOSS|STOP|SL)\b\s*:?\s*{NUM}"))
});

/// `TARGETS`, `TP`, and indexed forms like `TP1`.
pub static TARGETS_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?:TARGETS|TARGET|TPS|TP\d?)\b\s*:?"));

pub static LEVERAGE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?:LEVERAGE|LEV)\b\s*:?\s*X?\s*(\d+)\s*X?"));

/// Any keyword that opens a new field. Used to bound the targets region.
pub static ANY_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:BUY ?ZONE|SELL ?ZONE|ENTRY|STOP[ \-]?LOSS|STOP|SL|LEVERAGE|LEV|TARGETS|TARGET|TPS|TP\d?)\b")
});

/// Enumeration markers such as `1)`, `2. `, `T1:` or `TP 3 -` in front of a target.
pub static ENUMERATION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?:^|\s)(?:(?:TP|T)\s?\d{1,2}\s*[:.)\-]|\d{1,2}\s*(?:\)|[.:]\s))")
});

pub static NUMBER: LazyLock<Regex> = LazyLock::new(|| compile(NUM));

/// A captured field value, or the raw text when it is not a usable number.
pub type Parsed<T> = Result<T, String>;

/// Number as written, sign and range left to validation.
pub fn price(raw: &str) -> Parsed<Decimal> {
    Decimal::from_str(raw).map_err(|_| raw.to_string())
}

pub fn decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw).ok().filter(|d| *d > Decimal::ZERO)
}

pub fn strip_enumeration(text: &str) -> String {
    ENUMERATION.replace_all(text, " ").into_owned()
}

/// Every positive number in `text`, in order of appearance.
pub fn numbers(text: &str) -> Vec<Decimal> {
    NUMBER
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| decimal(m.as_str())))
        .collect()
}
