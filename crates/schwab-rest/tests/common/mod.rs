//! Common test utilities and fixtures for integration tests
//!
//! Contains sample JSON bodies shaped like the live Schwab API responses
//! and a local HTTP server that serves them.

#![allow(dead_code)]

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;

pub const TOKEN: &str = "test-token";

pub const QUOTES_RESPONSE: &str = r#"{
    "AAPL": {
        "assetMainType": "EQUITY",
        "symbol": "AAPL",
        "quote": {
            "lastPrice": 185.64,
            "openPrice": 184.22,
            "highPrice": 186.10,
            "lowPrice": 183.90,
            "closePrice": 184.25,
            "totalVolume": 48213544,
            "bidPrice": 185.63,
            "askPrice": 185.65,
            "netChange": 1.39
        }
    },
    "MSFT": {
        "assetMainType": "EQUITY",
        "symbol": "MSFT",
        "quote": {"lastPrice": 374.58, "totalVolume": 18000000}
    }
}"#;

pub const PRICE_HISTORY_RESPONSE: &str = r#"{
    "candles": [
        {"open": 184.22, "high": 184.50, "low": 184.01, "close": 184.40, "volume": 120000, "datetime": 1704205800000},
        {"open": 184.40, "high": 184.95, "low": 184.30, "close": 184.90, "volume": 98000, "datetime": 1704206100000}
    ],
    "symbol": "AAPL",
    "empty": false
}"#;

pub const OPTION_CHAIN_RESPONSE: &str = r#"{
    "symbol": "AAPL",
    "status": "SUCCESS",
    "underlyingPrice": 185.64,
    "callExpDateMap": {
        "2024-01-19:5": {
            "185.0": [{"putCall": "CALL", "symbol": "AAPL  240119C00185000", "bid": 2.1, "ask": 2.2, "last": 2.15, "totalVolume": 5400, "openInterest": 12000, "strikePrice": 185.0, "delta": 0.52, "expirationDate": "2024-01-19T21:00:00.000+00:00", "daysToExpiration": 5}]
        }
    },
    "putExpDateMap": {
        "2024-01-19:5": {
            "185.0": [{"putCall": "PUT", "symbol": "AAPL  240119P00185000", "bid": 1.5, "ask": 1.6, "last": 1.55, "totalVolume": 4100, "openInterest": 9000, "strikePrice": 185.0, "delta": -0.48, "expirationDate": "2024-01-19T21:00:00.000+00:00", "daysToExpiration": 5}]
        }
    }
}"#;

pub const ACCOUNT_NUMBERS_RESPONSE: &str =
    r#"[{"accountNumber": "12345678", "hashValue": "E5B9A1C3"}]"#;

pub const USER_PREFERENCE_RESPONSE: &str = r#"{
    "accounts": [{"accountNumber": "12345678", "primaryAccount": true}],
    "streamerInfo": [{
        "streamerSocketUrl": "wss://streamer-api.schwab.com/ws",
        "schwabClientCustomerId": "cust-1",
        "schwabClientCorrelId": "corr-1",
        "schwabClientChannel": "N9",
        "schwabClientFunctionId": "APIAPP"
    }],
    "offers": []
}"#;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn json(headers: &HeaderMap, body: &'static str) -> Response {
    if !authorized(headers) {
        return (StatusCode::UNAUTHORIZED, r#"{"message":"Unauthorized"}"#).into_response();
    }
    (StatusCode::OK, [("content-type", "application/json")], body).into_response()
}

async fn quotes(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("symbols").map(String::as_str) {
        Some("AAPL") => json(
            &headers,
            r#"{"AAPL": {"symbol": "AAPL", "assetMainType": "EQUITY", "quote": {"lastPrice": 185.64}}}"#,
        ),
        Some("NOPE") => json(&headers, r#"{"errors": {"invalidSymbols": ["NOPE"]}}"#),
        _ => json(&headers, QUOTES_RESPONSE),
    }
}

async fn price_history(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("periodType").map(String::as_str) == Some("year")
        && params.get("frequencyType").map(String::as_str) == Some("minute")
    {
        return (
            StatusCode::BAD_REQUEST,
            r#"{"errors":[{"status":"400","title":"Bad Request","detail":"Invalid frequencyType"}]}"#,
        )
            .into_response();
    }
    json(&headers, PRICE_HISTORY_RESPONSE)
}

/// Start a fake API server on a random local port
pub async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/marketdata/v1/quotes", get(quotes))
        .route("/marketdata/v1/pricehistory", get(price_history))
        .route(
            "/marketdata/v1/chains",
            get(|headers: HeaderMap| async move { json(&headers, OPTION_CHAIN_RESPONSE) }),
        )
        .route(
            "/trader/v1/accounts/accountNumbers",
            get(|headers: HeaderMap| async move { json(&headers, ACCOUNT_NUMBERS_RESPONSE) }),
        )
        .route(
            "/trader/v1/userPreference",
            get(|headers: HeaderMap| async move { json(&headers, USER_PREFERENCE_RESPONSE) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
