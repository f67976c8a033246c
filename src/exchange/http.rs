//! Plumbing shared by the REST adapters.

use std::str::FromStr;
use std::time::Duration;

use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde_json::Value;

use super::ExchangeError;

pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

pub fn timestamp_millis() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// Reads a response body as JSON.
///
/// 5xx and undecodable bodies are transport failures. A 4xx with a JSON body
/// is returned as-is so the adapter can read the exchange's own error code.
pub async fn read_json(resp: Response) -> Result<Value, ExchangeError> {
    let status = resp.status();
    let text = resp.text().await?;

    if status.is_server_error() {
        return Err(ExchangeError::Transport(format!(
            "HTTP {status}: {}",
            truncate(&text, 200)
        )));
    }

    serde_json::from_str::<Value>(&text).map_err(|e| {
        ExchangeError::Transport(format!(
            "HTTP {status}: undecodable body ({e}): {}",
            truncate(&text, 200)
        ))
    })
}

/// Reads a decimal that exchanges send either as a JSON string or a number.
pub fn decimal_field(value: &Value, key: &str) -> Option<Decimal> {
    let v = value.get(key)?;
    v.as_str()
        .and_then(|s| Decimal::from_str(s).ok())
        .or_else(|| v.as_i64().map(Decimal::from))
        .or_else(|| v.as_f64().and_then(|f| Decimal::try_from(f).ok()))
}

/// Reads a string field that may also arrive as a number.
pub fn string_field(value: &Value, key: &str) -> Option<String> {
    let v = value.get(key)?;
    v.as_str()
        .map(str::to_string)
        .or_else(|| v.as_i64().map(|n| n.to_string()))
        .or_else(|| v.as_u64().map(|n| n.to_string()))
}

/// `data` may be an object or a one-element array depending on the endpoint.
pub fn first_record(data: &Value) -> Option<&Value> {
    match data {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

pub fn missing(field: &str, context: &str) -> ExchangeError {
    ExchangeError::Transport(format!("response for {context} has no `{field}`"))
}

/// 10^-places, e.g. 3 → 0.001.
pub fn step_from_places(places: u32) -> Decimal {
    Decimal::new(1, places.min(28))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
