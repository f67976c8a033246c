//! Keyword-per-line extraction, preferred whenever the message has line structure.

use super::freeform::{self, Fields};
use super::patterns;

/// Scans each line with the free-form field scanner, and additionally lets a
/// targets keyword open a block: following lines that hold only numbers
/// (optionally enumerated) are targets until a non-numeric or keyword line.
/// A stop or any other keyword line therefore ends the block.
pub fn scan(text: &str) -> Fields {
    let mut fields = Fields::default();
    let mut in_targets = false;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let line_fields = freeform::scan(line);

        if line_fields.has_keyword() {
            in_targets = line_fields.targets.is_some();
            fields.merge(line_fields);
            continue;
        }

        if in_targets {
            let values = patterns::numbers(&patterns::strip_enumeration(line));
            if values.is_empty() || line.chars().any(|c| c.is_ascii_alphabetic() && !is_enumeration_letter(c)) {
                in_targets = false;
            } else {
                fields.targets.get_or_insert_with(Vec::new).extend(values);
            }
        }
    }

    fields
}

/// Letters allowed on a bare target line, for `T1)` style markers.
fn is_enumeration_letter(c: char) -> bool {
    c == 'T' || c == 'P'
}
