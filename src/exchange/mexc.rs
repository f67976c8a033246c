use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Method};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::auth::{Credentials, DigestEncoding, PrehashLayout, SignRequest, Signer};
use super::http::{self, decimal_field, missing, string_field};
use super::{base_asset, Exchange, ExchangeError, ProtectionMode, SymbolMeta};
use crate::models::{OrderIntent, Side, TriggerKind, TriggerOrder};

const MEXC_API_BASE: &str = "https://contract.mexc.com";

// order/submit enums
const SIDE_OPEN_LONG: u8 = 1;
const SIDE_OPEN_SHORT: u8 = 3;
const TYPE_MARKET: u8 = 5;
const OPEN_TYPE_ISOLATED: u8 = 1;

/// MEXC contract API. Stop-loss and the first target ride on the entry order.
#[derive(Debug, Clone)]
pub struct MexcClient {
    http: Client,
    signer: Signer,
    base_url: String,
}

impl MexcClient {
    pub fn new(http: Client, credentials: Credentials, base_url: Option<String>) -> Self {
        Self {
            http,
            signer: Signer::new(credentials, PrehashLayout::KeyPrefixed, DigestEncoding::Hex),
            base_url: base_url.unwrap_or_else(|| MEXC_API_BASE.into()),
        }
    }

    async fn public_get(&self, path_and_query: &str) -> Result<Value, ExchangeError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self.http.get(&url).send().await?;
        interpret(http::read_json(resp).await?)
    }

    /// Signs `{api_key}{timestamp}{params}` where params is the JSON body for
    /// POST and the sorted query string for GET.
    async fn signed(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, ExchangeError> {
        let timestamp = http::timestamp_millis();

        let query_string = sorted_query(query);

        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let payload = if method == Method::GET { &query_string } else { &body };
        let signature = self.signer.sign(&SignRequest {
            timestamp: &timestamp,
            method: method.as_str(),
            path,
            body: payload,
            nonce: None,
        })?;

        let url = if query_string.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query_string)
        };

        let resp = self
            .http
            .request(method, &url)
            .header("ApiKey", self.signer.api_key())
            .header("Request-Time", &timestamp)
            .header("Signature", signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        interpret(http::read_json(resp).await?)
    }
}

/// `k=v` pairs joined by `&`, sorted by key. Signed and sent in this exact form.
pub fn sorted_query(query: &[(&str, String)]) -> String {
    let mut params: Vec<_> = query.iter().collect();
    params.sort_by(|a, b| a.0.cmp(b.0));
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// MEXC answers `{"success":true,"code":0,"data":...}` or
/// `{"success":false,"code":2005,"message":"..."}`.
pub fn interpret(body: Value) -> Result<Value, ExchangeError> {
    match body.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(body.get("data").cloned().unwrap_or(Value::Null)),
        Some(false) => Err(ExchangeError::rejected(
            string_field(&body, "code").unwrap_or_else(|| "unknown".into()),
            string_field(&body, "message")
                .or_else(|| string_field(&body, "msg"))
                .unwrap_or_else(|| "unknown error".into()),
        )),
        None => Err(ExchangeError::Transport(format!(
            "response without success flag: {body}"
        ))),
    }
}

#[async_trait]
impl Exchange for MexcClient {
    fn name(&self) -> &'static str {
        "mexc"
    }

    fn format_symbol(&self, symbol: &str) -> String {
        format!("{}_USDT", base_asset(&symbol.to_uppercase()))
    }

    fn protection_mode(&self) -> ProtectionMode {
        ProtectionMode::Embedded
    }

    async fn symbol_meta(&self, exchange_symbol: &str) -> Result<SymbolMeta, ExchangeError> {
        let data = self
            .public_get(&format!("/api/v1/contract/detail?symbol={exchange_symbol}"))
            .await?;
        if data.is_null() {
            return Err(ExchangeError::rejected(
                "symbol",
                format!("{exchange_symbol} is not listed on MEXC futures"),
            ));
        }

        let lot_step = decimal_field(&data, "volUnit").unwrap_or(Decimal::ONE);
        Ok(SymbolMeta {
            exchange_symbol: exchange_symbol.to_string(),
            lot_step,
            min_size: decimal_field(&data, "minVol").unwrap_or(lot_step),
            contract_size: decimal_field(&data, "contractSize").unwrap_or(Decimal::ONE),
            price_step: decimal_field(&data, "priceUnit"),
        })
    }

    async fn last_price(&self, exchange_symbol: &str) -> Result<Decimal, ExchangeError> {
        let data = self
            .public_get(&format!("/api/v1/contract/ticker?symbol={exchange_symbol}"))
            .await?;
        decimal_field(&data, "lastPrice").ok_or_else(|| missing("lastPrice", "ticker"))
    }

    async fn available_balance(&self) -> Result<Decimal, ExchangeError> {
        let data = self
            .signed(Method::GET, "/api/v1/private/account/asset/USDT", &[], None)
            .await?;
        decimal_field(&data, "availableBalance").ok_or_else(|| missing("availableBalance", "asset"))
    }

    /// The order takes one stop and one target, each closing the whole
    /// position. Targets after the first are not sent.
    fn embedded_protection(&self, intent: &OrderIntent) -> Vec<TriggerOrder> {
        let mut orders = Vec::with_capacity(2);
        if let Some(price) = intent.stop_loss_price {
            orders.push(TriggerOrder {
                kind: TriggerKind::StopLoss,
                trigger_price: price,
                size: intent.quantity,
            });
        }
        if let Some(first) = intent.take_profit_plan.first() {
            orders.push(TriggerOrder {
                kind: TriggerKind::TakeProfit,
                trigger_price: first.price,
                size: intent.quantity,
            });
        }
        orders
    }

    async fn place_entry(&self, intent: &OrderIntent) -> Result<String, ExchangeError> {
        let side = match intent.side {
            Side::Buy => SIDE_OPEN_LONG,
            Side::Sell => SIDE_OPEN_SHORT,
        };

        let mut body = json!({
            "symbol": intent.exchange_symbol,
            "price": intent.reference_price.to_string(),
            "vol": intent.quantity.to_string(),
            "leverage": intent.leverage,
            "side": side,
            "type": TYPE_MARKET,
            "openType": OPEN_TYPE_ISOLATED,
            "externalOid": intent.client_oid,
        });
        for order in self.embedded_protection(intent) {
            let field = match order.kind {
                TriggerKind::StopLoss => "stopLossPrice",
                TriggerKind::TakeProfit => "takeProfitPrice",
            };
            body[field] = json!(order.trigger_price.to_string());
        }

        let data = self
            .signed(Method::POST, "/api/v1/private/order/submit", &[], Some(body))
            .await?;

        // data is the bare order id, or an object carrying it
        match &data {
            Value::String(id) => Ok(id.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => string_field(other, "orderId").ok_or_else(|| missing("orderId", "order/submit")),
        }
    }
}
