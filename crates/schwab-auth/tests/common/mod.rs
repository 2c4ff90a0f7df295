//! Local OAuth token endpoint for integration tests
//!
//! Records every token request and answers with numbered access tokens so
//! tests can tell how many grants were issued.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use schwab_auth::{Credentials, TokenProvider, TokenSet, TokenStore, DEFAULT_CALLBACK_URL};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub const APP_KEY: &str = "my_app_key";
pub const APP_SECRET: &str = "secret";

/// One request received by the token endpoint
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub form: HashMap<String, String>,
}

#[derive(Clone)]
struct ServerState {
    requests: Arc<Mutex<Vec<TokenRequest>>>,
    delay: std::time::Duration,
}

/// Handle to a running fake token endpoint
pub struct FakeTokenServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<TokenRequest>>>,
}

impl FakeTokenServer {
    pub fn requests(&self) -> Vec<TokenRequest> {
        self.requests.lock().clone()
    }
}

async fn token(State(state): State<ServerState>, headers: HeaderMap, body: String) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let form: HashMap<String, String> = serde_urlencoded::from_str(&body).unwrap_or_default();
    let n = {
        let mut requests = state.requests.lock();
        requests.push(TokenRequest {
            authorization: header("authorization"),
            content_type: header("content-type"),
            form: form.clone(),
        });
        requests.len()
    };
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    if form.get("code").map(String::as_str) == Some("bad-code") {
        return (StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#).into_response();
    }
    let body = serde_json::json!({
        "access_token": format!("access-{}", n),
        "refresh_token": format!("refresh-{}", n),
        "id_token": "id",
        "token_type": "Bearer",
        "scope": "api",
        "expires_in": 1800
    });
    (StatusCode::OK, [("content-type", "application/json")], body.to_string()).into_response()
}

/// Start a token endpoint that waits `delay` before answering
pub async fn spawn_token_server(delay: std::time::Duration) -> FakeTokenServer {
    let state = ServerState {
        requests: Arc::new(Mutex::new(Vec::new())),
        delay,
    };
    let requests = Arc::clone(&state.requests);
    let app = Router::new().route("/token", post(token)).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    FakeTokenServer {
        base_url: format!("http://{}", addr),
        requests,
    }
}

/// Fresh token file path for one test
pub fn token_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("schwab-auth-it-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("tokens.json")
}

/// Saved tokens issued `access_age` and `refresh_age` ago
pub fn saved_tokens(access_age: Duration, refresh_age: Duration) -> TokenSet {
    let now = Utc::now();
    TokenSet {
        access_token: "old-access".into(),
        refresh_token: "old-refresh".into(),
        id_token: None,
        token_type: "Bearer".into(),
        scope: "api".into(),
        expires_in: 1800,
        access_issued_at: now - access_age,
        refresh_issued_at: now - refresh_age,
    }
}

/// Provider pointed at `server`, loading whatever is saved at `path`
pub fn provider(server: &FakeTokenServer, path: &PathBuf) -> TokenProvider {
    let creds = Credentials::new(APP_KEY, APP_SECRET, DEFAULT_CALLBACK_URL).unwrap();
    TokenProvider::new(creds, TokenStore::new(path.clone()))
        .unwrap()
        .with_base_url(server.base_url.clone())
}
