use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Method};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::auth::{Credentials, DigestEncoding, PrehashLayout, SignRequest, Signer};
use super::http::{self, decimal_field, first_record, missing, string_field};
use super::{Exchange, ExchangeError, ProtectionMode, SymbolMeta};
use crate::models::{OrderIntent, Side, TriggerKind, TriggerOrder};

const BITGET_API_BASE: &str = "https://api.bitget.com";
const PRODUCT_TYPE: &str = "USDT-FUTURES";
const MARGIN_COIN: &str = "USDT";
const SUCCESS_CODE: &str = "00000";

/// Bitget v2 mix (USDT-margined perpetual) API.
#[derive(Debug, Clone)]
pub struct BitgetClient {
    http: Client,
    signer: Signer,
    base_url: String,
}

impl BitgetClient {
    pub fn new(http: Client, credentials: Credentials, base_url: Option<String>) -> Self {
        Self {
            http,
            signer: Signer::new(credentials, PrehashLayout::TimestampFirst, DigestEncoding::Base64),
            base_url: base_url.unwrap_or_else(|| BITGET_API_BASE.into()),
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
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let signature = self.signer.sign(&SignRequest {
            timestamp: &timestamp,
            method: method.as_str(),
            path: path_and_query,
            body: &body,
            nonce: None,
        })?;

        let url = format!("{}{}", self.base_url, path_and_query);
        let resp = self
            .http
            .request(method, &url)
            .header("ACCESS-KEY", self.signer.api_key())
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", &timestamp)
            .header("ACCESS-PASSPHRASE", self.signer.passphrase())
            .header("locale", "en-US")
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        interpret(http::read_json(resp).await?)
    }

    async fn prepare_position(&self, intent: &OrderIntent) -> Result<(), ExchangeError> {
        self.signed(
            Method::POST,
            "/api/v2/mix/account/set-margin-mode",
            Some(json!({
                "symbol": intent.exchange_symbol,
                "productType": PRODUCT_TYPE,
                "marginCoin": MARGIN_COIN,
                "marginMode": "isolated",
            })),
        )
        .await?;

        self.signed(
            Method::POST,
            "/api/v2/mix/account/set-leverage",
            Some(json!({
                "symbol": intent.exchange_symbol,
                "productType": PRODUCT_TYPE,
                "marginCoin": MARGIN_COIN,
                "leverage": intent.leverage.to_string(),
                "holdSide": hold_side(intent.side),
            })),
        )
        .await?;

        Ok(())
    }
}

/// Bitget answers `{"code":"00000","msg":"success","data":...}`.
pub fn interpret(body: Value) -> Result<Value, ExchangeError> {
    let code = string_field(&body, "code").unwrap_or_default();
    if code == SUCCESS_CODE {
        return Ok(body.get("data").cloned().unwrap_or(Value::Null));
    }

    let message = string_field(&body, "msg").unwrap_or_else(|| "unknown error".into());
    if code.is_empty() {
        return Err(ExchangeError::Transport(format!("response without code: {body}")));
    }
    Err(ExchangeError::rejected(code, message))
}

fn hold_side(side: Side) -> &'static str {
    match side {
        Side::Buy => "long",
        Side::Sell => "short",
    }
}

#[async_trait]
impl Exchange for BitgetClient {
    fn name(&self) -> &'static str {
        "bitget"
    }

    fn format_symbol(&self, symbol: &str) -> String {
        symbol.to_uppercase()
    }

    fn protection_mode(&self) -> ProtectionMode {
        ProtectionMode::Separate
    }

    async fn symbol_meta(&self, exchange_symbol: &str) -> Result<SymbolMeta, ExchangeError> {
        let path = format!(
            "/api/v2/mix/market/contracts?productType={PRODUCT_TYPE}&symbol={exchange_symbol}"
        );
        let data = self.public_get(&path).await?;
        let contract = first_record(&data).ok_or_else(|| {
            ExchangeError::rejected("symbol", format!("{exchange_symbol} is not listed on Bitget"))
        })?;

        let volume_places = decimal_field(contract, "volumePlace")
            .and_then(|d| d.to_u32())
            .unwrap_or(0);
        let lot_step = decimal_field(contract, "sizeMultiplier")
            .filter(|d| *d > Decimal::ZERO)
            .unwrap_or_else(|| http::step_from_places(volume_places));
        let min_size = decimal_field(contract, "minTradeNum").unwrap_or(lot_step);

        let price_step = decimal_field(contract, "pricePlace").and_then(|places| {
            let places = places.to_u32()?;
            let end_step = decimal_field(contract, "priceEndStep").unwrap_or(Decimal::ONE);
            http::step_from_places(places).checked_mul(end_step)
        });

        Ok(SymbolMeta {
            exchange_symbol: exchange_symbol.to_string(),
            lot_step,
            min_size,
            contract_size: Decimal::ONE,
            price_step,
        })
    }

    async fn last_price(&self, exchange_symbol: &str) -> Result<Decimal, ExchangeError> {
        let path = format!(
            "/api/v2/mix/market/ticker?productType={PRODUCT_TYPE}&symbol={exchange_symbol}"
        );
        let data = self.public_get(&path).await?;
        first_record(&data)
            .and_then(|t| decimal_field(t, "lastPr"))
            .ok_or_else(|| missing("lastPr", "ticker"))
    }

    async fn available_balance(&self) -> Result<Decimal, ExchangeError> {
        let path = format!("/api/v2/mix/account/accounts?productType={PRODUCT_TYPE}");
        let data = self.signed(Method::GET, &path, None).await?;
        data.as_array()
            .into_iter()
            .flatten()
            .find(|acc| acc.get("marginCoin").and_then(Value::as_str) == Some(MARGIN_COIN))
            .and_then(|acc| decimal_field(acc, "available"))
            .ok_or_else(|| missing("available", "accounts"))
    }

    async fn place_entry(&self, intent: &OrderIntent) -> Result<String, ExchangeError> {
        self.prepare_position(intent).await?;

        let data = self
            .signed(
                Method::POST,
                "/api/v2/mix/order/place-order",
                Some(json!({
                    "symbol": intent.exchange_symbol,
                    "productType": PRODUCT_TYPE,
                    "marginMode": "isolated",
                    "marginCoin": MARGIN_COIN,
                    "size": intent.quantity.to_string(),
                    "side": intent.side.as_lower(),
                    "orderType": "market",
                    "clientOid": intent.client_oid,
                })),
            )
            .await?;

        string_field(&data, "orderId").ok_or_else(|| missing("orderId", "place-order"))
    }

    async fn place_trigger(
        &self,
        intent: &OrderIntent,
        order: &TriggerOrder,
    ) -> Result<String, ExchangeError> {
        let plan_type = match order.kind {
            TriggerKind::StopLoss => "loss_plan",
            TriggerKind::TakeProfit => "profit_plan",
        };

        let data = self
            .signed(
                Method::POST,
                "/api/v2/mix/order/place-tpsl-order",
                Some(json!({
                    "marginCoin": MARGIN_COIN,
                    "productType": PRODUCT_TYPE,
                    "symbol": intent.exchange_symbol,
                    "planType": plan_type,
                    "triggerPrice": order.trigger_price.to_string(),
                    "triggerType": "mark_price",
                    "executePrice": "0",
                    "holdSide": hold_side(intent.side),
                    "size": order.size.to_string(),
                })),
            )
            .await?;

        string_field(&data, "orderId").ok_or_else(|| missing("orderId", "place-tpsl-order"))
    }
}
