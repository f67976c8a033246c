//! Full-text extraction for single-line (or unstructured) messages.
//!
//! Scanning order is fixed: entry, stop-loss and leverage spans are located
//! first and blanked out, then targets are read from what remains. A stop
//! price can therefore never be captured as a target.

use rust_decimal::Decimal;

use super::patterns::{self, Parsed, ANY_KEYWORD, ENTRY, LEVERAGE, STOP, TARGETS_KEYWORD};

/// Raw field captures from one piece of text. `None` means the keyword was
/// absent; `Some(Err(raw))` means it was present with an unusable value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Fields {
    pub entry: Option<Parsed<(Decimal, Decimal)>>,
    pub stop: Option<Parsed<Decimal>>,
    pub leverage: Option<Parsed<u32>>,
    pub targets: Option<Vec<Decimal>>,
}

impl Fields {
    pub fn has_keyword(&self) -> bool {
        self.entry.is_some() || self.stop.is_some() || self.leverage.is_some() || self.targets.is_some()
    }

    /// Keeps the first value seen for every field; targets accumulate.
    pub fn merge(&mut self, other: Fields) {
        self.entry = self.entry.take().or(other.entry);
        self.stop = self.stop.take().or(other.stop);
        self.leverage = self.leverage.take().or(other.leverage);
        if let Some(more) = other.targets {
            self.targets.get_or_insert_with(Vec::new).extend(more);
        }
    }
}

pub fn scan(text: &str) -> Fields {
    let mut masked = text.to_string();
    let mut fields = Fields::default();

    if let Some(caps) = ENTRY.captures(text) {
        fields.entry = caps.get(1).map(|first| -> Parsed<(Decimal, Decimal)> {
            let low = patterns::price(first.as_str())?;
            let high = match caps.get(2) {
                Some(second) => patterns::price(second.as_str())?,
                None => low,
            };
            Ok((low, high))
        });
        if let Some(m) = caps.get(0) {
            blank(&mut masked, m.start(), m.end());
        }
    }

    if let Some(caps) = STOP.captures(text) {
        fields.stop = caps.get(1).map(|m| patterns::price(m.as_str()));
        if let Some(m) = caps.get(0) {
            blank(&mut masked, m.start(), m.end());
        }
    }

    if let Some(caps) = LEVERAGE.captures(text) {
        fields.leverage = caps
            .get(1)
            .map(|m| m.as_str().parse::<u32>().map_err(|_| m.as_str().to_string()));
        if let Some(m) = caps.get(0) {
            blank(&mut masked, m.start(), m.end());
        }
    }

    fields.targets = targets(text, &masked);
    fields
}

/// Numbers following each targets keyword, up to the next keyword of any kind.
///
/// Region bounds come from the original text so a blanked stop still ends
/// the run; the numbers themselves are read from the masked copy.
fn targets(text: &str, masked: &str) -> Option<Vec<Decimal>> {
    let starts: Vec<_> = TARGETS_KEYWORD.find_iter(text).map(|m| m.end()).collect();
    if starts.is_empty() {
        return None;
    }

    let mut found = Vec::new();
    for start in starts {
        let end = ANY_KEYWORD
            .find_at(text, start)
            .map(|m| m.start())
            .unwrap_or(text.len());
        let region = patterns::strip_enumeration(&masked[start..end]);
        found.extend(patterns::numbers(&region));
    }
    Some(found)
}

/// Replaces a byte span with as many spaces, so offsets into `text` stay valid.
fn blank(text: &mut String, start: usize, end: usize) {
    let replacement = " ".repeat(end - start);
    text.replace_range(start..end, &replacement);
}
