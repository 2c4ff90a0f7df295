//! Local streamer server for integration tests
//!
//! Accepts WebSocket connections, answers LOGIN/SUBS/ADD/LOGOUT the way the
//! brokerage streamer does and pushes one data frame per subscribed key.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use schwab_stream::{ConnectionConfig, ReconnectConfig, StaticStreamerAuth};
use serde_json::{json, Value};
use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub const TOKEN: &str = "test-token";

/// How the fake streamer behaves
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Code returned for LOGIN; non-zero closes the socket
    pub login_code: i64,
    /// Send heartbeat notifications at this interval
    pub heartbeat_every: Option<Duration>,
    /// Close the first connection this long after it was accepted
    pub drop_first_after: Option<Duration>,
    /// Admin notice code pushed right after a successful LOGIN
    pub notice_after_login: Option<i64>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            login_code: 0,
            heartbeat_every: None,
            drop_first_after: None,
            notice_after_login: None,
        }
    }
}

/// Handle to a running fake streamer
pub struct FakeStreamer {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
}

impl FakeStreamer {
    /// Auth pointing at this server
    pub fn auth(&self) -> Arc<StaticStreamerAuth> {
        Arc::new(StaticStreamerAuth::for_url(self.url.clone(), TOKEN))
    }

    /// All requests received so far, in order
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }

    /// Requests with the given command
    pub fn requests_with(&self, command: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r["command"] == command)
            .collect()
    }

    /// Number of accepted connections
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Fast-failing connection config for tests
pub fn test_config() -> ConnectionConfig {
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

/// Start a fake streamer on an ephemeral local port
pub async fn spawn_streamer(behavior: Behavior) -> FakeStreamer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));

    let server_requests = Arc::clone(&requests);
    let server_connections = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let n = server_connections.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::spawn(serve(stream, behavior.clone(), Arc::clone(&server_requests), n));
        }
    });

    FakeStreamer {
        url: format!("ws://{}", addr),
        requests,
        connections,
    }
}

async fn serve(stream: TcpStream, behavior: Behavior, requests: Arc<Mutex<Vec<Value>>>, n: usize) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();

    let heartbeat_period = behavior.heartbeat_every.unwrap_or(Duration::from_secs(3600));
    let mut heartbeat = interval(heartbeat_period);
    let drop_at = behavior
        .drop_first_after
        .filter(|_| n == 1)
        .map(|d| Instant::now() + d);

    loop {
        let drop_timer = async {
            match drop_at {
                Some(at) => sleep_until(at).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            msg = read.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => continue,
                };
                let frame: Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                let items = frame["requests"].as_array().cloned().unwrap_or_default();
                for request in items {
                    requests.lock().push(request.clone());
                    let (replies, close) = reply_to(&request, &behavior);
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
            _ = heartbeat.tick(), if behavior.heartbeat_every.is_some() => {
                let millis = chrono::Utc::now().timestamp_millis();
                let frame = json!({"notify": [{"heartbeat": millis.to_string()}]});
                if write.send(Message::Text(frame.to_string())).await.is_err() {
                    return;
                }
            }
            _ = drop_timer => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

fn response(request: &Value, code: i64, msg: &str) -> Value {
    json!({
        "response": [{
            "service": request["service"],
            "command": request["command"],
            "requestid": request["requestid"],
            "SchwabClientCorrelId": request["SchwabClientCorrelId"],
            "timestamp": 1718900000000_i64,
            "content": {"code": code, "msg": msg}
        }]
    })
}

/// Replies for one request and whether to close afterwards
fn reply_to(request: &Value, behavior: &Behavior) -> (Vec<Value>, bool) {
    let service = request["service"].as_str().unwrap_or_default();
    match request["command"].as_str().unwrap_or_default() {
        "LOGIN" => {
            let msg = if behavior.login_code == 0 {
                "server=fake-1;status=NP"
            } else {
                "Login denied"
            };
            let mut replies = vec![response(request, behavior.login_code, msg)];
            if let (0, Some(code)) = (behavior.login_code, behavior.notice_after_login) {
                replies.push(json!({
                    "notify": [{
                        "service": "ADMIN",
                        "timestamp": 1718900000000_i64,
                        "content": {"code": code, "msg": "Connection closed by another login"}
                    }]
                }));
            }
            (replies, behavior.login_code != 0)
        }
        "LOGOUT" => (vec![response(request, 0, "SUCCESS")], true),
        "SUBS" | "ADD" => {
            let keys: Vec<&str> = request["parameters"]["keys"]
                .as_str()
                .unwrap_or_default()
                .split(',')
                .filter(|k| !k.is_empty())
                .collect();
            let content: Vec<Value> = keys
                .iter()
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
            (vec![response(request, 0, "SUBS command succeeded"), data], false)
        }
        _ => (vec![response(request, 0, "")], false),
    }
}
