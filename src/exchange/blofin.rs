use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Method};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::auth::{Credentials, DigestEncoding, PrehashLayout, SignRequest, Signer};
use super::http::{self, decimal_field, first_record, missing, string_field};
use super::{base_asset, Exchange, ExchangeError, ProtectionMode, SymbolMeta};
use crate::models::{OrderIntent, TriggerKind, TriggerOrder};

const BLOFIN_API_BASE: &str = "https://openapi.blofin.com";
const SUCCESS_CODE: &str = "0";

/// BloFin perpetual futures API. Sizes are in contracts.
#[derive(Debug, Clone)]
pub struct BlofinClient {
    http: Client,
    signer: Signer,
    base_url: String,
}

impl BlofinClient {
    pub fn new(http: Client, credentials: Credentials, base_url: Option<String>) -> Self {
        Self {
            http,
            signer: Signer::new(
                credentials,
                PrehashLayout::PathFirstWithNonce,
                DigestEncoding::HexThenBase64,
            ),
            base_url: base_url.unwrap_or_else(|| BLOFIN_API_BASE.into()),
        }
    }

    async fn public_get(&self, path_and_query: &str) -> Result<Value, ExchangeError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self.http.get(&url).send().await?;
        interpret(http::read_json(resp).await?)
    }

    async fn signed(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Value>,
    ) -> Result<Value, ExchangeError> {
        let timestamp = http::timestamp_millis();
        let nonce = uuid::Uuid::new_v4().to_string();
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let signature = self.signer.sign(&SignRequest {
            timestamp: &timestamp,
            method: method.as_str(),
            path: path_and_query,
            body: &body,
            nonce: Some(&nonce),
        })?;

        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self
            .http
            .request(method, &url)
            .header("ACCESS-KEY", self.signer.api_key())
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", &timestamp)
            .header("ACCESS-NONCE", &nonce)
            .header("ACCESS-PASSPHRASE", self.signer.passphrase())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        interpret(http::read_json(resp).await?)
    }
}

/// BloFin answers `{"code":"0","msg":"success","data":...}`. Order endpoints
/// additionally carry a per-order `code`/`msg` inside `data[0]`.
pub fn interpret(body: Value) -> Result<Value, ExchangeError> {
    let code = string_field(&body, "code").unwrap_or_default();
    if code.is_empty() {
        return Err(ExchangeError::Transport(format!("response without code: {body}")));
    }
    if code != SUCCESS_CODE {
        let message = string_field(&body, "msg").unwrap_or_else(|| "unknown error".into());
        let detail = body
            .get("data")
            .and_then(first_record)
            .and_then(|d| Some((string_field(d, "code")?, string_field(d, "msg")?)));
        return Err(match detail {
            Some((inner_code, inner_msg)) if inner_code != SUCCESS_CODE => {
                ExchangeError::rejected(inner_code, inner_msg)
            }
            _ => ExchangeError::rejected(code, message),
        });
    }
    Ok(body.get("data").cloned().unwrap_or(Value::Null))
}

/// Per-order result inside a successful envelope.
fn order_id(data: &Value, id_field: &str, context: &str) -> Result<String, ExchangeError> {
    let record = first_record(data).ok_or_else(|| missing("data", context))?;
    if let Some(code) = string_field(record, "code").filter(|c| c != SUCCESS_CODE) {
        let message = string_field(record, "msg").unwrap_or_default();
        return Err(ExchangeError::rejected(code, message));
    }
    string_field(record, id_field).ok_or_else(|| missing(id_field, context))
}

#[async_trait]
impl Exchange for BlofinClient {
    fn name(&self) -> &'static str {
        "blofin"
    }

    fn format_symbol(&self, symbol: &str) -> String {
        format!("{}-USDT", base_asset(&symbol.to_uppercase()))
    }

    fn protection_mode(&self) -> ProtectionMode {
        ProtectionMode::Separate
    }

    async fn symbol_meta(&self, exchange_symbol: &str) -> Result<SymbolMeta, ExchangeError> {
        let path = format!("/api/v1/market/instruments?instId={exchange_symbol}");
        let data = self.public_get(&path).await?;
        let instrument = first_record(&data).ok_or_else(|| {
            ExchangeError::rejected("symbol", format!("{exchange_symbol} is not listed on BloFin"))
        })?;

        let lot_step = decimal_field(instrument, "lotSize").unwrap_or(Decimal::ONE);
        Ok(SymbolMeta {
            exchange_symbol: exchange_symbol.to_string(),
            lot_step,
            min_size: decimal_field(instrument, "minSize").unwrap_or(lot_step),
            contract_size: decimal_field(instrument, "contractValue").unwrap_or(Decimal::ONE),
            price_step: decimal_field(instrument, "tickSize"),
        })
    }

    async fn last_price(&self, exchange_symbol: &str) -> Result<Decimal, ExchangeError> {
        let path = format!("/api/v1/market/tickers?instId={exchange_symbol}");
        let data = self.public_get(&path).await?;
        first_record(&data)
            .and_then(|t| decimal_field(t, "last"))
            .ok_or_else(|| missing("last", "tickers"))
    }

    async fn available_balance(&self) -> Result<Decimal, ExchangeError> {
        let data = self
            .signed(Method::GET, "/api/v1/asset/balances?accountType=futures", None)
            .await?;
        data.as_array()
            .into_iter()
            .flatten()
            .find(|b| b.get("currency").and_then(Value::as_str) == Some("USDT"))
            .and_then(|b| decimal_field(b, "available"))
            .ok_or_else(|| missing("available", "balances"))
    }

    async fn place_entry(&self, intent: &OrderIntent) -> Result<String, ExchangeError> {
        self.signed(
            Method::POST,
            "/api/v1/account/set-leverage",
            Some(json!({
                "instId": intent.exchange_symbol,
                "leverage": intent.leverage.to_string(),
                "marginMode": "isolated",
                "positionSide": "net",
            })),
        )
        .await?;

        let data = self
            .signed(
                Method::POST,
                "/api/v1/trade/order",
                Some(json!({
                    "instId": intent.exchange_symbol,
                    "marginMode": "isolated",
                    "positionSide": "net",
                    "side": intent.side.as_lower(),
                    "orderType": "market",
                    "size": intent.quantity.to_string(),
                    "clientOrderId": intent.client_oid,
                })),
            )
            .await?;

        order_id(&data, "orderId", "trade/order")
    }

    async fn place_trigger(
        &self,
        intent: &OrderIntent,
        order: &TriggerOrder,
    ) -> Result<String, ExchangeError> {
        let mut body = json!({
            "instId": intent.exchange_symbol,
            "marginMode": "isolated",
            "positionSide": "net",
            "side": intent.side.opposite().as_lower(),
            "size": order.size.to_string(),
            "reduceOnly": "true",
        });
        let (trigger_key, price_key) = match order.kind {
            TriggerKind::TakeProfit => ("tpTriggerPrice", "tpOrderPrice"),
            TriggerKind::StopLoss => ("slTriggerPrice", "slOrderPrice"),
        };
        body[trigger_key] = json!(order.trigger_price.to_string());
        // -1 executes at market once triggered
        body[price_key] = json!("-1");

        let data = self
            .signed(Method::POST, "/api/v1/trade/order-tpsl", Some(body))
            .await?;

        order_id(&data, "tpslId", "trade/order-tpsl")
    }
}
