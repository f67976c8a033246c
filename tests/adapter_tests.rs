mod common;

use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::json;

use signal_trader::exchange::mexc::sorted_query;
use signal_trader::exchange::{
    BitgetClient, BlofinClient, Credentials, DigestEncoding, Exchange, ExchangeError, MexcClient,
    PrehashLayout, SignRequest, Signer,
};
use signal_trader::models::{OrderIntent, Side, TakeProfitLeg, TriggerKind, TriggerOrder};

use common::http_stub::{RecordedRequest, StubServer};

/// Talks to the local stub directly, whatever proxy the environment sets.
fn http() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

fn credentials() -> Credentials {
    Credentials {
        api_key: "test-key".into(),
        api_secret: "test-secret".into(),
        passphrase: Some("test-pass".into()),
    }
}

/// BTC long, 0.004 at ~50500, x10, stop 49000, two targets.
fn intent(exchange_symbol: &str) -> OrderIntent {
    OrderIntent {
        symbol: "BTCUSDT".into(),
        exchange_symbol: exchange_symbol.into(),
        side: Side::Buy,
        notional_amount: Decimal::from(20),
        quantity: Decimal::new(4, 3),
        leverage: 10,
        reference_price: Decimal::from(50_500),
        take_profit_plan: vec![
            TakeProfitLeg {
                price: Decimal::from(52_000),
                fraction: Decimal::new(5, 1),
                size: Decimal::new(2, 3),
            },
            TakeProfitLeg {
                price: Decimal::from(53_000),
                fraction: Decimal::new(2, 1),
                size: Decimal::ZERO,
            },
        ],
        stop_loss_price: Some(Decimal::from(49_000)),
        client_oid: "oid-123".into(),
    }
}

/// Signature the adapter should have sent, recomputed from what arrived.
fn expected_signature(signer: &Signer, req: &RecordedRequest, timestamp_header: &str, nonce: Option<&str>) -> String {
    signer
        .sign(&SignRequest {
            timestamp: req.header(timestamp_header),
            method: &req.method,
            path: &req.target,
            body: &req.body,
            nonce,
        })
        .unwrap()
}

// ---- Bitget ----

fn bitget_ok(data: serde_json::Value) -> serde_json::Value {
    json!({"code": "00000", "msg": "success", "requestTime": 1700000000000_i64, "data": data})
}

#[tokio::test]
async fn test_bitget_entry_sets_margin_and_leverage_then_orders() {
    let server = StubServer::start(vec![
        ("/api/v2/mix/account/set-margin-mode", bitget_ok(json!({}))),
        ("/api/v2/mix/account/set-leverage", bitget_ok(json!({}))),
        ("/api/v2/mix/order/place-order", bitget_ok(json!({"orderId": "B-1", "clientOid": "oid-123"}))),
    ])
    .await;
    let client = BitgetClient::new(http(), credentials(), Some(server.base_url.clone()));

    let order_id = client.place_entry(&intent("BTCUSDT")).await.unwrap();
    assert_eq!(order_id, "B-1");

    let requests = server.requests();
    let paths: Vec<&str> = requests.iter().map(|r| r.path()).collect();
    assert_eq!(
        paths,
        vec![
            "/api/v2/mix/account/set-margin-mode",
            "/api/v2/mix/account/set-leverage",
            "/api/v2/mix/order/place-order",
        ]
    );

    let signer = Signer::new(credentials(), PrehashLayout::TimestampFirst, DigestEncoding::Base64);
    for req in &requests {
        assert_eq!(req.method, "POST");
        assert_eq!(req.header("ACCESS-KEY"), "test-key");
        assert_eq!(req.header("ACCESS-PASSPHRASE"), "test-pass");
        assert_eq!(req.header("Content-Type"), "application/json");
        assert!(!req.header("ACCESS-TIMESTAMP").is_empty());
        assert_eq!(
            req.header("ACCESS-SIGN"),
            expected_signature(&signer, req, "ACCESS-TIMESTAMP", None),
            "{}",
            req.target
        );
    }

    let margin = requests[0].json();
    assert_eq!(margin["marginMode"], "isolated");
    assert_eq!(margin["symbol"], "BTCUSDT");

    let leverage = requests[1].json();
    assert_eq!(leverage["leverage"], "10");
    assert_eq!(leverage["holdSide"], "long");

    let order = requests[2].json();
    assert_eq!(order["marginMode"], "isolated");
    assert_eq!(order["orderType"], "market");
    assert_eq!(order["side"], "buy");
    assert_eq!(order["size"], "0.004");
    assert_eq!(order["clientOid"], "oid-123");
    assert_eq!(order["productType"], "USDT-FUTURES");
}

#[tokio::test]
async fn test_bitget_signed_get_includes_query_in_prehash() {
    let server = StubServer::start(vec![(
        "/api/v2/mix/account/accounts",
        bitget_ok(json!([{"marginCoin": "USDT", "available": "812.5"}])),
    )])
    .await;
    let client = BitgetClient::new(http(), credentials(), Some(server.base_url.clone()));

    let balance = client.available_balance().await.unwrap();
    assert_eq!(balance, Decimal::new(8125, 1));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "GET");
    assert_eq!(req.target, "/api/v2/mix/account/accounts?productType=USDT-FUTURES");
    assert!(req.body.is_empty());

    let signer = Signer::new(credentials(), PrehashLayout::TimestampFirst, DigestEncoding::Base64);
    assert_eq!(
        req.header("ACCESS-SIGN"),
        expected_signature(&signer, req, "ACCESS-TIMESTAMP", None)
    );
}

#[tokio::test]
async fn test_bitget_stop_loss_is_a_loss_plan() {
    let server = StubServer::start(vec![(
        "/api/v2/mix/order/place-tpsl-order",
        bitget_ok(json!({"orderId": "T-1"})),
    )])
    .await;
    let client = BitgetClient::new(http(), credentials(), Some(server.base_url.clone()));
    let stop = TriggerOrder {
        kind: TriggerKind::StopLoss,
        trigger_price: Decimal::from(49_000),
        size: Decimal::new(4, 3),
    };

    let order_id = client.place_trigger(&intent("BTCUSDT"), &stop).await.unwrap();
    assert_eq!(order_id, "T-1");

    let body = server.requests()[0].json();
    assert_eq!(body["planType"], "loss_plan");
    assert_eq!(body["triggerPrice"], "49000");
    assert_eq!(body["holdSide"], "long");
    assert_eq!(body["size"], "0.004");
}

#[tokio::test]
async fn test_bitget_order_rejection_carries_exchange_code() {
    let server = StubServer::start(vec![
        ("/api/v2/mix/account/set-margin-mode", bitget_ok(json!({}))),
        ("/api/v2/mix/account/set-leverage", bitget_ok(json!({}))),
        (
            "/api/v2/mix/order/place-order",
            json!({"code": "40762", "msg": "The order amount exceeds the balance"}),
        ),
    ])
    .await;
    let client = BitgetClient::new(http(), credentials(), Some(server.base_url.clone()));

    let result = client.place_entry(&intent("BTCUSDT")).await;
    assert_eq!(
        result,
        Err(ExchangeError::rejected("40762", "The order amount exceeds the balance"))
    );
}

// ---- BloFin ----

#[tokio::test]
async fn test_blofin_entry_signs_with_nonce() {
    let server = StubServer::start(vec![
        (
            "/api/v1/account/set-leverage",
            json!({"code": "0", "msg": "success", "data": {"instId": "BTC-USDT", "leverage": "10"}}),
        ),
        (
            "/api/v1/trade/order",
            json!({"code": "0", "msg": "", "data": [{"orderId": "F-1", "clientOrderId": "oid-123", "code": "0", "msg": ""}]}),
        ),
    ])
    .await;
    let client = BlofinClient::new(http(), credentials(), Some(server.base_url.clone()));

    let order_id = client.place_entry(&intent("BTC-USDT")).await.unwrap();
    assert_eq!(order_id, "F-1");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);

    let signer = Signer::new(
        credentials(),
        PrehashLayout::PathFirstWithNonce,
        DigestEncoding::HexThenBase64,
    );
    for req in &requests {
        assert_eq!(req.header("ACCESS-KEY"), "test-key");
        assert_eq!(req.header("ACCESS-PASSPHRASE"), "test-pass");
        let nonce = req.header("ACCESS-NONCE");
        assert!(!nonce.is_empty());
        assert_eq!(
            req.header("ACCESS-SIGN"),
            expected_signature(&signer, req, "ACCESS-TIMESTAMP", Some(nonce))
        );
    }
    // fresh nonce per request
    assert_ne!(requests[0].header("ACCESS-NONCE"), requests[1].header("ACCESS-NONCE"));

    let leverage = requests[0].json();
    assert_eq!(leverage["leverage"], "10");
    assert_eq!(leverage["marginMode"], "isolated");

    let order = requests[1].json();
    assert_eq!(order["instId"], "BTC-USDT");
    assert_eq!(order["marginMode"], "isolated");
    assert_eq!(order["orderType"], "market");
    assert_eq!(order["side"], "buy");
    assert_eq!(order["size"], "0.004");
    assert_eq!(order["clientOrderId"], "oid-123");
}

#[tokio::test]
async fn test_blofin_take_profit_is_reduce_only_market() {
    let server = StubServer::start(vec![(
        "/api/v1/trade/order-tpsl",
        json!({"code": "0", "msg": "", "data": {"tpslId": "TP-9", "code": "0", "msg": ""}}),
    )])
    .await;
    let client = BlofinClient::new(http(), credentials(), Some(server.base_url.clone()));
    let target = TriggerOrder {
        kind: TriggerKind::TakeProfit,
        trigger_price: Decimal::from(52_000),
        size: Decimal::new(2, 3),
    };

    let id = client.place_trigger(&intent("BTC-USDT"), &target).await.unwrap();
    assert_eq!(id, "TP-9");

    let body = server.requests()[0].json();
    assert_eq!(body["side"], "sell");
    assert_eq!(body["reduceOnly"], "true");
    assert_eq!(body["tpTriggerPrice"], "52000");
    assert_eq!(body["tpOrderPrice"], "-1");
    assert!(body.get("slTriggerPrice").is_none());
}

// ---- MEXC ----

#[tokio::test]
async fn test_mexc_entry_embeds_stop_and_first_target() {
    let server = StubServer::start(vec![(
        "/api/v1/private/order/submit",
        json!({"success": true, "code": 0, "data": "739113577038255616"}),
    )])
    .await;
    let client = MexcClient::new(http(), credentials(), Some(server.base_url.clone()));
    let intent = intent("BTC_USDT");

    let order_id = client.place_entry(&intent).await.unwrap();
    assert_eq!(order_id, "739113577038255616");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.header("ApiKey"), "test-key");

    let signer = Signer::new(credentials(), PrehashLayout::KeyPrefixed, DigestEncoding::Hex);
    assert_eq!(req.header("Signature"), expected_signature(&signer, req, "Request-Time", None));

    let body = req.json();
    assert_eq!(body["symbol"], "BTC_USDT");
    assert_eq!(body["vol"], "0.004");
    assert_eq!(body["leverage"], 10);
    assert_eq!(body["openType"], 1);
    assert_eq!(body["type"], 5);
    assert_eq!(body["side"], 1);
    assert_eq!(body["externalOid"], "oid-123");
    assert_eq!(body["stopLossPrice"], "49000");
    assert_eq!(body["takeProfitPrice"], "52000");

    let attached = client.embedded_protection(&intent);
    assert_eq!(attached.len(), 2);
    assert!(attached.iter().all(|t| t.size == intent.quantity));
}

#[tokio::test]
async fn test_mexc_signed_get_signs_sorted_query() {
    let server = StubServer::start(vec![(
        "/api/v1/private/account/asset/USDT",
        json!({"success": true, "code": 0, "data": {"currency": "USDT", "availableBalance": "250.75"}}),
    )])
    .await;
    let client = MexcClient::new(http(), credentials(), Some(server.base_url.clone()));

    let balance = client.available_balance().await.unwrap();
    assert_eq!(balance, Decimal::new(25_075, 2));

    let req = &server.requests()[0];
    assert_eq!(req.method, "GET");
    assert_eq!(req.target, "/api/v1/private/account/asset/USDT");

    // GET requests sign the sorted query string in place of a body
    let signer = Signer::new(credentials(), PrehashLayout::KeyPrefixed, DigestEncoding::Hex);
    let expected = signer
        .sign(&SignRequest {
            timestamp: req.header("Request-Time"),
            method: "GET",
            path: req.path(),
            body: &sorted_query(&[]),
            nonce: None,
        })
        .unwrap();
    assert_eq!(req.header("Signature"), expected);
}

#[tokio::test]
async fn test_mexc_rejection_carries_numeric_code() {
    let server = StubServer::start(vec![(
        "/api/v1/private/order/submit",
        json!({"success": false, "code": 2005, "message": "Balance insufficient"}),
    )])
    .await;
    let client = MexcClient::new(http(), credentials(), Some(server.base_url.clone()));

    let result = client.place_entry(&intent("BTC_USDT")).await;
    assert_eq!(result, Err(ExchangeError::rejected("2005", "Balance insufficient")));
}
