//! OAuth token provider
//!
//! Exchanges authorization codes, refreshes access tokens and hands out a
//! valid bearer token to the REST and streamer clients.

use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::credentials::Credentials;
use crate::error::{AuthError, AuthResult};
use crate::token::{TokenResponse, TokenSet, TokenStore};

/// OAuth base URL of the Schwab API
pub const OAUTH_BASE_URL: &str = "https://api.schwabapi.com/v1/oauth";

/// Provider of OAuth access tokens
///
/// Cheap to clone; clones share the cached token set.
///
/// # Example
///
/// ```no_run
/// use schwab_auth::{Credentials, TokenProvider, TokenStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = TokenProvider::new(Credentials::from_env()?, TokenStore::from_env())?;
/// let token = provider.access_token().await?;
/// println!("Bearer {}", token);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenProvider {
    credentials: Credentials,
    client: Client,
    store: TokenStore,
    base_url: String,
    tokens: Arc<RwLock<Option<TokenSet>>>,
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
}

impl TokenProvider {
    /// Create a provider, loading any previously saved tokens
    pub fn new(credentials: Credentials, store: TokenStore) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("schwab-auth/0.1.0")
            .build()?;
        let tokens = store.load();
        if tokens.is_some() {
            debug!("Loaded saved tokens from {}", store.path().display());
        }

        Ok(Self {
            credentials,
            client,
            store,
            base_url: OAUTH_BASE_URL.to_string(),
            tokens: Arc::new(RwLock::new(tokens)),
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Create a provider from environment variables
    pub fn from_env() -> AuthResult<Self> {
        Self::new(Credentials::from_env()?, TokenStore::from_env())
    }

    /// Override the OAuth base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the credentials used by this provider
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Snapshot of the current token set
    pub fn tokens(&self) -> Option<TokenSet> {
        self.tokens.read().clone()
    }

    /// URL the user opens in a browser to authorize the app
    pub fn authorization_url(&self) -> AuthResult<String> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.base_url),
            &[
                ("client_id", self.credentials.app_key()),
                ("redirect_uri", self.credentials.callback_url()),
            ],
        )
        .map_err(|e| AuthError::Parse(e.to_string()))?;
        Ok(url.to_string())
    }

    /// Extract the `code` query parameter from the URL the browser was redirected to
    pub fn code_from_redirect(redirect_url: &str) -> AuthResult<String> {
        let url = Url::parse(redirect_url.trim())
            .map_err(|e| AuthError::Parse(format!("invalid redirect URL: {}", e)))?;
        url.query_pairs()
            .find(|(k, _)| *k == "code")
            .map(|(_, v)| v.into_owned())
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::Parse("redirect URL has no code parameter".into()))
    }

    /// Exchange an authorization code for a new token set
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> AuthResult<TokenSet> {
        let body = serde_urlencoded::to_string([
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.credentials.callback_url()),
        ])
        .map_err(|e| AuthError::Parse(e.to_string()))?;

        let response = self.post_token(body).await?;
        let tokens = TokenSet::from_grant(response, Utc::now());
        self.store.save(&tokens)?;
        *self.tokens.write() = Some(tokens.clone());
        info!("Obtained new tokens via authorization code");
        Ok(tokens)
    }

    /// Refresh the access token with the stored refresh token
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> AuthResult<TokenSet> {
        self.refresh_inner(None).await
    }

    /// Refresh because `stale_token` was found expired or was rejected
    ///
    /// Callers queued behind another refresh get that refresh's result
    /// instead of posting to the token endpoint again.
    #[instrument(skip_all)]
    pub async fn refresh_stale(&self, stale_token: &str) -> AuthResult<TokenSet> {
        self.refresh_inner(Some(stale_token)).await
    }

    async fn refresh_inner(&self, stale_token: Option<&str>) -> AuthResult<TokenSet> {
        let _guard = self.refresh_lock.lock().await;
        let current = self
            .tokens()
            .ok_or_else(|| AuthError::ReauthRequired("no saved tokens".into()))?;
        let now = Utc::now();
        if current.refresh_expired(now) {
            return Err(AuthError::ReauthRequired("refresh token expired".into()));
        }
        if let Some(stale) = stale_token {
            if current.access_token != stale && !current.access_expired(now) {
                debug!("Access token already refreshed by another caller");
                return Ok(current);
            }
        }

        let body = serde_urlencoded::to_string([
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.as_str()),
        ])
        .map_err(|e| AuthError::Parse(e.to_string()))?;

        let response = self.post_token(body).await?;
        let tokens = current.refreshed(response, Utc::now());
        self.store.save(&tokens)?;
        *self.tokens.write() = Some(tokens.clone());
        info!("Access token refreshed");
        Ok(tokens)
    }

    /// A currently valid access token, refreshing when needed
    pub async fn access_token(&self) -> AuthResult<String> {
        let now = Utc::now();
        match self.tokens() {
            None => Err(AuthError::ReauthRequired("no saved tokens".into())),
            Some(tokens) if tokens.refresh_expired(now) => {
                Err(AuthError::ReauthRequired("refresh token expired".into()))
            }
            Some(tokens) if !tokens.access_expired(now) => Ok(tokens.access_token),
            Some(tokens) => {
                debug!("Access token expired, refreshing");
                Ok(self.refresh_stale(&tokens.access_token).await?.access_token)
            }
        }
    }

    /// Whether a valid access token can be obtained
    pub async fn check_authentication(&self) -> bool {
        match self.access_token().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Authentication check failed: {}", e);
                false
            }
        }
    }

    async fn post_token(&self, body: String) -> AuthResult<TokenResponse> {
        let url = format!("{}/token", self.base_url);
        debug!("Requesting tokens from {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.credentials.basic_auth_header())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| AuthError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::DEFAULT_CALLBACK_URL;

    fn provider(name: &str) -> TokenProvider {
        let creds = Credentials::new("my_app_key", "secret", DEFAULT_CALLBACK_URL).unwrap();
        let path = std::env::temp_dir()
            .join(format!("schwab-provider-{}-{}", name, std::process::id()))
            .join("tokens.json");
        TokenProvider::new(creds, TokenStore::new(path)).unwrap()
    }

    #[test]
    fn test_authorization_url() {
        let url = provider("authurl").authorization_url().unwrap();
        assert!(url.starts_with("https://api.schwabapi.com/v1/oauth/authorize?"));
        assert!(url.contains("client_id=my_app_key"));
        assert!(url.contains("redirect_uri=https%3A%2F%2F127.0.0.1%3A8080"));
    }

    #[test]
    fn test_code_from_redirect() {
        let code = TokenProvider::code_from_redirect(
            "https://127.0.0.1:8080/?code=C0.abc%40def&session=xyz",
        )
        .unwrap();
        assert_eq!(code, "C0.abc@def");

        assert!(TokenProvider::code_from_redirect("https://127.0.0.1:8080/?session=1").is_err());
        assert!(TokenProvider::code_from_redirect("not a url").is_err());
    }

    #[tokio::test]
    async fn test_access_token_without_tokens() {
        let provider = provider("empty");
        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::ReauthRequired(_)));
        assert!(!provider.check_authentication().await);
    }

    #[tokio::test]
    async fn test_access_token_uses_cached_token() {
        let provider = provider("cached");
        *provider.tokens.write() = Some(TokenSet::from_grant(
            TokenResponse {
                access_token: "fresh".into(),
                refresh_token: "r".into(),
                id_token: None,
                token_type: "Bearer".into(),
                scope: "api".into(),
                expires_in: 1800,
            },
            Utc::now(),
        ));
        assert_eq!(provider.access_token().await.unwrap(), "fresh");
        assert!(provider.check_authentication().await);
    }

    #[tokio::test]
    #[ignore = "Requires SCHWAB_APP_KEY, SCHWAB_APP_SECRET and saved tokens"]
    async fn test_refresh_real_tokens() {
        let provider = TokenProvider::from_env().unwrap();
        let tokens = provider.refresh().await.unwrap();
        assert!(!tokens.access_token.is_empty());
    }
}
