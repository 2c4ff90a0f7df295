//! Streamer credentials
//!
//! The connection needs the streamer session info published in the user
//! preferences and a bearer token for LOGIN. Both come through
//! [`StreamerAuth`] so tests can point the streamer at a local server.

use async_trait::async_trait;
use schwab_rest::{RestError, SchwabRestClient, TokenSource};
use schwab_types::{SchwabError, SchwabResult, StreamerInfo};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Source of streamer session info and access tokens
#[async_trait]
pub trait StreamerAuth: Send + Sync {
    /// Streamer socket URL and client identifiers
    async fn streamer_info(&self) -> SchwabResult<StreamerInfo>;

    /// Bearer token for the LOGIN request
    async fn access_token(&self) -> SchwabResult<String>;
}

/// [`StreamerAuth`] backed by the REST client
#[derive(Clone)]
pub struct RestStreamerAuth {
    client: SchwabRestClient,
    tokens: Arc<dyn TokenSource>,
}

impl RestStreamerAuth {
    pub fn new(client: SchwabRestClient, tokens: Arc<dyn TokenSource>) -> Self {
        Self { client, tokens }
    }

    /// Transient REST failures keep the reconnect loop going
    fn map_error(&self, error: RestError) -> SchwabError {
        if error.is_retryable() {
            SchwabError::ConnectionFailed {
                url: self.client.base_url().to_string(),
                source: std::io::Error::other(error.to_string()),
            }
        } else {
            SchwabError::Authentication(error.to_string())
        }
    }
}

impl std::fmt::Debug for RestStreamerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStreamerAuth")
            .field("base_url", &self.client.base_url())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StreamerAuth for RestStreamerAuth {
    #[instrument(skip(self))]
    async fn streamer_info(&self) -> SchwabResult<StreamerInfo> {
        let prefs = self
            .client
            .get_user_preference()
            .await
            .map_err(|e| self.map_error(e))?;
        let info = prefs
            .streamer_info()
            .cloned()
            .ok_or_else(|| SchwabError::Authentication("user preferences have no streamer info".into()))?;
        debug!("Streamer socket {}", info.streamer_socket_url);
        Ok(info)
    }

    async fn access_token(&self) -> SchwabResult<String> {
        self.tokens
            .access_token()
            .await
            .map_err(|e| self.map_error(e))
    }
}

/// Fixed streamer info and token
#[derive(Debug, Clone)]
pub struct StaticStreamerAuth {
    info: StreamerInfo,
    token: String,
}

impl StaticStreamerAuth {
    pub fn new(info: StreamerInfo, token: impl Into<String>) -> Self {
        Self {
            info,
            token: token.into(),
        }
    }

    /// Info pointing at the given socket URL with placeholder identifiers
    pub fn for_url(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(
            StreamerInfo {
                streamer_socket_url: url.into(),
                schwab_client_customer_id: "customer".into(),
                schwab_client_correl_id: "correl".into(),
                schwab_client_channel: "N9".into(),
                schwab_client_function_id: "APIAPP".into(),
            },
            token,
        )
    }
}

#[async_trait]
impl StreamerAuth for StaticStreamerAuth {
    async fn streamer_info(&self) -> SchwabResult<StreamerInfo> {
        Ok(self.info.clone())
    }

    async fn access_token(&self) -> SchwabResult<String> {
        Ok(self.token.clone())
    }
}
