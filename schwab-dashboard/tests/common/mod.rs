//! Fake brokerage services and a running dashboard for integration tests
//!
//! The REST side answers price history, option chain and quote requests
//! with fixed JSON. The streamer side accepts LOGIN, answers each SUBS/ADD
//! with one data frame per key and closes on LOGOUT.

#![allow(dead_code)]

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use schwab_dashboard::{routes, DashboardConfig, DashboardState, RealtimeBuffers, RealtimeIntegration};
use schwab_data::DataManager;
use schwab_rest::{ClientConfig, SchwabRestClient, StaticToken};
use schwab_stream::{ConnectionConfig, ReconnectConfig, StaticStreamerAuth, Streamer};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub const TOKEN: &str = "test-token";

pub const PRICE_HISTORY_RESPONSE: &str = r#"{
    "candles": [
        {"open": 184.22, "high": 184.50, "low": 184.01, "close": 184.40, "volume": 120000, "datetime": 1704205800000},
        {"open": 184.40, "high": 184.95, "low": 184.30, "close": 184.90, "volume": 98000, "datetime": 1704206100000},
        {"open": 184.90, "high": 185.10, "low": 184.70, "close": 185.00, "volume": 87000, "datetime": 1704206400000}
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
            "185.0": [{"putCall": "PUT", "symbol": "AAPL  240119P00185000", "bid": 1.5, "ask": 1.6, "last": 1.55, "totalVolume": 2700, "openInterest": 9000, "strikePrice": 185.0, "delta": -0.48, "expirationDate": "2024-01-19T21:00:00.000+00:00", "daysToExpiration": 5}]
        }
    }
}"#;

fn json_response(body: &'static str) -> Response {
    (StatusCode::OK, [("content-type", "application/json")], body).into_response()
}

/// Start the fake REST API; returns its base URL
pub async fn spawn_api() -> String {
    let app = Router::new()
        .route("/marketdata/v1/pricehistory", get(|| async { json_response(PRICE_HISTORY_RESPONSE) }))
        .route("/marketdata/v1/chains", get(|| async { json_response(OPTION_CHAIN_RESPONSE) }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Handle to a running fake streamer
pub struct FakeStreamer {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
}

impl FakeStreamer {
    pub fn auth(&self) -> Arc<StaticStreamerAuth> {
        Arc::new(StaticStreamerAuth::for_url(self.url.clone(), TOKEN))
    }

    pub fn requests_with(&self, command: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r["command"] == command)
            .cloned()
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Start a fake streamer on an ephemeral local port
pub async fn spawn_streamer() -> FakeStreamer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));

    let server_requests = Arc::clone(&requests);
    let server_connections = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            server_connections.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve(stream, Arc::clone(&server_requests)));
        }
    });

    FakeStreamer {
        url: format!("ws://{}", addr),
        requests,
        connections,
    }
}

async fn serve(stream: TcpStream, requests: Arc<Mutex<Vec<Value>>>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();

    while let Some(Ok(msg)) = read.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => return,
            _ => continue,
        };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        for request in frame["requests"].as_array().cloned().unwrap_or_default() {
            requests.lock().push(request.clone());
            let (replies, close) = reply_to(&request);
            for reply in replies {
                if write.send(Message::Text(reply.to_string())).await.is_err() {
                    return;
                }
            }
            if close {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

fn response(request: &Value, msg: &str) -> Value {
    json!({
        "response": [{
            "service": request["service"],
            "command": request["command"],
            "requestid": request["requestid"],
            "SchwabClientCorrelId": request["SchwabClientCorrelId"],
            "timestamp": 1718900000000_i64,
            "content": {"code": 0, "msg": msg}
        }]
    })
}

fn reply_to(request: &Value) -> (Vec<Value>, bool) {
    let service = request["service"].as_str().unwrap_or_default();
    match request["command"].as_str().unwrap_or_default() {
        "LOGIN" => (vec![response(request, "server=fake-1;status=NP")], false),
        "LOGOUT" => (vec![response(request, "SUCCESS")], true),
        "SUBS" | "ADD" => {
            let content: Vec<Value> = request["parameters"]["keys"]
                .as_str()
                .unwrap_or_default()
                .split(',')
                .filter(|k| !k.is_empty())
                .map(|key| match service {
                    "LEVELONE_OPTIONS" => json!({
                        "key": key, "2": 4.1, "3": 4.3, "4": 4.2, "9": 1200,
                        "20": 150.0, "21": "C", "22": "AAPL", "28": 0.52
                    }),
                    _ => json!({"key": key, "1": 100.0, "2": 100.2, "3": 100.1, "8": 1000}),
                })
                .collect();
            let data = json!({
                "data": [{
                    "service": service,
                    "timestamp": 1718900000000_i64,
                    "command": request["command"],
                    "content": content
                }]
            });
            (vec![response(request, "SUBS command succeeded"), data], false)
        }
        _ => (vec![response(request, "")], false),
    }
}

/// Fast-failing streamer connection settings
pub fn test_connection_config() -> ConnectionConfig {
    ConnectionConfig::new()
        .with_timeout(Duration::from_secs(2))
        .with_login_timeout(Duration::from_secs(2))
        .with_reconnect(
            ReconnectConfig::new()
                .with_initial_delay(Duration::from_millis(50))
                .with_max_delay(Duration::from_millis(200))
                .with_jitter(0.0),
        )
}

/// Poll a condition until it holds or five seconds pass
pub async fn wait_for(condition: impl Fn() -> bool) -> bool {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

/// Unique empty directory under the system temp dir
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("schwab-dashboard-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Data manager wired to a fake API and a fake streamer
pub async fn manager(name: &str) -> (Arc<DataManager>, FakeStreamer) {
    let base_url = spawn_api().await;
    let rest = SchwabRestClient::with_config(
        ClientConfig::new().with_base_url(base_url),
        Arc::new(StaticToken::new(TOKEN)),
    )
    .unwrap();
    let streamer_server = spawn_streamer().await;
    let streamer = Arc::new(Streamer::new(streamer_server.auth(), test_connection_config()));
    let manager = DataManager::new(rest, streamer, temp_dir(name)).unwrap();
    (Arc::new(manager), streamer_server)
}

/// A dashboard served on an ephemeral port
pub struct TestDashboard {
    pub base_url: String,
    pub state: Arc<DashboardState>,
    pub streamer: FakeStreamer,
    pub client: reqwest::Client,
}

impl TestDashboard {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let response = self.client.delete(self.url(path)).send().await.unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }
}

/// Serve a dashboard for `symbols` backed by the fake services
pub async fn spawn_dashboard(name: &str, symbols: &[&str]) -> TestDashboard {
    let (manager, streamer) = manager(name).await;
    let config = DashboardConfig::new().with_symbols(symbols);
    let realtime = RealtimeIntegration::new(Arc::clone(&manager))
        .with_update_interval(Duration::from_millis(50));
    let state = Arc::new(DashboardState::with_realtime(
        manager,
        &config,
        realtime,
        Arc::new(RealtimeBuffers::new()),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestDashboard {
        base_url: format!("http://{}", addr),
        state,
        streamer,
        client: reqwest::Client::new(),
    }
}
