//! Access-token sources for authenticated requests

use async_trait::async_trait;
use schwab_auth::TokenProvider;

use crate::error::RestResult;

/// Something that can hand out a valid bearer token
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently valid access token
    async fn access_token(&self) -> RestResult<String>;

    /// A replacement for `rejected` after the API answered 401
    ///
    /// Sources that cannot refresh hand out the same token again.
    async fn refresh_token(&self, rejected: &str) -> RestResult<String> {
        let _ = rejected;
        self.access_token().await
    }
}

#[async_trait]
impl TokenSource for TokenProvider {
    async fn access_token(&self) -> RestResult<String> {
        Ok(TokenProvider::access_token(self).await?)
    }

    async fn refresh_token(&self, rejected: &str) -> RestResult<String> {
        Ok(self.refresh_stale(rejected).await?.access_token)
    }
}

/// Fixed token, for tests and short-lived scripts
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> RestResult<String> {
        Ok(self.0.clone())
    }
}
