//! Fake REST API and fixtures for data manager tests

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use schwab_data::DataManager;
use schwab_rest::{ClientConfig, SchwabRestClient, StaticToken};
use schwab_stream::{StaticStreamerAuth, Streamer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const PRICE_HISTORY_RESPONSE: &str = r#"{
    "candles": [
        {"open": 184.22, "high": 184.50, "low": 184.01, "close": 184.40, "volume": 120000, "datetime": 1704205800000},
        {"open": 184.40, "high": 184.95, "low": 184.30, "close": 184.90, "volume": 98000, "datetime": 1704206100000}
    ],
    "symbol": "AAPL",
    "empty": false
}"#;

pub const EMPTY_HISTORY_RESPONSE: &str = r#"{"candles": [], "symbol": "EMPTY", "empty": true}"#;

pub const OPTION_CHAIN_RESPONSE: &str = r#"{
    "symbol": "AAPL",
    "status": "SUCCESS",
    "underlyingPrice": 185.64,
    "callExpDateMap": {
        "2024-01-19:5": {
            "185.0": [{"putCall": "CALL", "symbol": "AAPL  240119C00185000", "description": "AAPL 01/19/2024 185.00 C", "bid": 2.1, "ask": 2.2, "last": 2.15, "totalVolume": 5400, "openInterest": 12000, "strikePrice": 185.0, "delta": 0.52, "expirationDate": "2024-01-19T21:00:00.000+00:00", "daysToExpiration": 5}]
        }
    },
    "putExpDateMap": {
        "2024-01-19:5": {
            "185.0": [{"putCall": "PUT", "symbol": "AAPL  240119P00185000", "description": "AAPL 01/19/2024 185.00 P", "bid": 1.5, "ask": 1.6, "last": 1.55, "totalVolume": 4100, "openInterest": 9000, "strikePrice": 185.0, "delta": -0.48, "expirationDate": "2024-01-19T21:00:00.000+00:00", "daysToExpiration": 5}]
        }
    }
}"#;

pub const QUOTES_RESPONSE: &str = r#"{
    "AAPL": {"symbol": "AAPL", "assetMainType": "EQUITY", "quote": {"lastPrice": 185.64}},
    "MSFT": {"symbol": "MSFT", "assetMainType": "EQUITY", "quote": {"lastPrice": 374.58}}
}"#;

/// Request counters of the fake API
#[derive(Default)]
pub struct Hits {
    pub price_history: AtomicUsize,
}

impl Hits {
    pub fn price_history(&self) -> usize {
        self.price_history.load(Ordering::SeqCst)
    }
}

fn json(body: &'static str) -> Response {
    (StatusCode::OK, [("content-type", "application/json")], body).into_response()
}

async fn price_history(
    State(hits): State<Arc<Hits>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    hits.price_history.fetch_add(1, Ordering::SeqCst);
    match params.get("symbol").map(String::as_str) {
        Some("EMPTY") => json(EMPTY_HISTORY_RESPONSE),
        _ => json(PRICE_HISTORY_RESPONSE),
    }
}

/// Start the fake API; returns its base URL and counters
pub async fn spawn_api() -> (String, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let app = Router::new()
        .route("/marketdata/v1/pricehistory", get(price_history))
        .route("/marketdata/v1/chains", get(|| async { json(OPTION_CHAIN_RESPONSE) }))
        .route("/marketdata/v1/quotes", get(|| async { json(QUOTES_RESPONSE) }))
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), hits)
}

/// Unique empty directory under the system temp dir
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("schwab-data-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Manager wired to the fake API with a streamer that is never started
pub async fn manager(name: &str) -> (DataManager, Arc<Hits>) {
    let (base_url, hits) = spawn_api().await;
    let rest = SchwabRestClient::with_config(
        ClientConfig::new().with_base_url(base_url),
        Arc::new(StaticToken::new("test-token")),
    )
    .unwrap();
    let streamer = Arc::new(Streamer::new(
        Arc::new(StaticStreamerAuth::for_url("ws://127.0.0.1:9", "test-token")),
        Default::default(),
    ));
    let manager = DataManager::new(rest, streamer, temp_dir(name)).unwrap();
    (manager, hits)
}
