//! App credentials for the Schwab OAuth endpoints
//!
//! # Security
//!
//! The app secret is stored using the `secrecy` crate which:
//! - Zeroizes memory on drop
//! - Prevents accidental logging via Debug impl
//! - Provides explicit access via `expose_secret()`

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{AuthError, AuthResult};

/// Callback URL registered with the app when none is configured
pub const DEFAULT_CALLBACK_URL: &str = "https://127.0.0.1:8080";

/// Registered application credentials
pub struct Credentials {
    /// App key (public client id)
    app_key: String,
    /// App secret (zeroized on drop)
    app_secret: SecretString,
    /// Redirect URI registered for the app
    callback_url: String,
}

impl Credentials {
    /// Create credentials from an app key, app secret and callback URL
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> AuthResult<Self> {
        let app_key = app_key.into();
        let app_secret = app_secret.into();
        if app_key.trim().is_empty() {
            return Err(AuthError::InvalidCredentials("empty app key".into()));
        }
        if app_secret.trim().is_empty() {
            return Err(AuthError::InvalidCredentials("empty app secret".into()));
        }

        Ok(Self {
            app_key,
            app_secret: SecretString::from(app_secret),
            callback_url: callback_url.into(),
        })
    }

    /// Create credentials from environment variables
    ///
    /// Loads `.env` when present, then reads `SCHWAB_APP_KEY`,
    /// `SCHWAB_APP_SECRET` and `SCHWAB_CALLBACK_URL` (defaults to
    /// `https://127.0.0.1:8080`).
    pub fn from_env() -> AuthResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create credentials from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_key = lookup("SCHWAB_APP_KEY")
            .ok_or_else(|| AuthError::EnvVarNotSet("SCHWAB_APP_KEY".to_string()))?;
        let app_secret = lookup("SCHWAB_APP_SECRET")
            .ok_or_else(|| AuthError::EnvVarNotSet("SCHWAB_APP_SECRET".to_string()))?;
        let callback_url =
            lookup("SCHWAB_CALLBACK_URL").unwrap_or_else(|| DEFAULT_CALLBACK_URL.to_string());

        Self::new(app_key, app_secret, callback_url)
    }

    /// Get the app key
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// Get the callback URL
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// `Authorization` header value for the token endpoint
    pub fn basic_auth_header(&self) -> String {
        let raw = format!("{}:{}", self.app_key, self.app_secret.expose_secret());
        format!("Basic {}", BASE64.encode(raw))
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            app_key: self.app_key.clone(),
            app_secret: SecretString::from(self.app_secret.expose_secret().to_string()),
            callback_url: self.callback_url.clone(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field(
                "app_key",
                &format!("{}...", &self.app_key[..8.min(self.app_key.len())]),
            )
            .field("app_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}
