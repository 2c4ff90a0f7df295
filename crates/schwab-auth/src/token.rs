//! OAuth token set and its file persistence

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::AuthResult;

/// Lifetime of an access token in seconds
pub const ACCESS_TOKEN_TTL_SECS: i64 = 30 * 60;
/// Lifetime of a refresh token in seconds
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Tokens this close to expiry (seconds) are treated as expired
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Default token file name
pub const DEFAULT_TOKENS_FILE: &str = "tokens.json";

/// Raw response of the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub expires_in: i64,
}

/// Access and refresh tokens with their issue times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub token_type: String,
    pub scope: String,
    /// Access token lifetime in seconds as reported by the server
    pub expires_in: i64,
    pub access_issued_at: DateTime<Utc>,
    pub refresh_issued_at: DateTime<Utc>,
}

impl TokenSet {
    /// Build from a fresh authorization-code grant
    pub(crate) fn from_grant(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            token_type: response.token_type,
            scope: response.scope,
            expires_in: response.expires_in,
            access_issued_at: now,
            refresh_issued_at: now,
        }
    }

    /// Apply a refresh grant; the refresh token's issue time is kept
    pub(crate) fn refreshed(&self, response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token.or_else(|| self.id_token.clone()),
            token_type: response.token_type,
            scope: response.scope,
            expires_in: response.expires_in,
            access_issued_at: now,
            refresh_issued_at: self.refresh_issued_at,
        }
    }

    fn access_ttl(&self) -> Duration {
        if self.expires_in > 0 {
            Duration::seconds(self.expires_in)
        } else {
            Duration::seconds(ACCESS_TOKEN_TTL_SECS)
        }
    }

    /// Whether the access token is expired or about to expire
    pub fn access_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.access_issued_at + self.access_ttl()
    }

    /// Whether the refresh token is expired or about to expire
    pub fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS)
            >= self.refresh_issued_at + Duration::seconds(REFRESH_TOKEN_TTL_SECS)
    }
}

/// JSON file holding the current token set
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `SCHWAB_TOKENS_FILE`, or `tokens.json` in the working directory
    pub fn from_env() -> Self {
        let path = std::env::var("SCHWAB_TOKENS_FILE")
            .unwrap_or_else(|_| DEFAULT_TOKENS_FILE.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved tokens; a missing or unreadable file yields `None`
    pub fn load(&self) -> Option<TokenSet> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                debug!("Ignoring unreadable token file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, tokens: &TokenSet) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(tokens)
            .map_err(|e| crate::AuthError::Parse(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        debug!("Saved tokens to {}", self.path.display());
        Ok(())
    }

    /// Remove the token file if present
    pub fn clear(&self) -> AuthResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> TokenResponse {
        TokenResponse {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            id_token: None,
            token_type: "Bearer".into(),
            scope: "api".into(),
            expires_in: 1800,
        }
    }

    fn temp_store(name: &str) -> TokenStore {
        let dir = std::env::temp_dir().join(format!("schwab-auth-{}-{}", name, std::process::id()));
        TokenStore::new(dir.join("tokens.json"))
    }

    #[test]
    fn test_access_expiry_with_margin() {
        let issued = Utc::now();
        let tokens = TokenSet::from_grant(response(), issued);
        assert!(!tokens.access_expired(issued));
        assert!(!tokens.access_expired(issued + Duration::minutes(28)));
        // Inside the 60 second margin
        assert!(tokens.access_expired(issued + Duration::seconds(1750)));
        assert!(tokens.access_expired(issued + Duration::minutes(31)));
    }

    #[test]
    fn test_refresh_expiry() {
        let issued = Utc::now();
        let tokens = TokenSet::from_grant(response(), issued);
        assert!(!tokens.refresh_expired(issued + Duration::days(6)));
        assert!(tokens.refresh_expired(issued + Duration::days(7)));
    }

    #[test]
    fn test_refresh_keeps_refresh_issue_time() {
        let issued = Utc::now();
        let tokens = TokenSet::from_grant(response(), issued);
        let later = issued + Duration::hours(1);
        let refreshed = tokens.refreshed(response(), later);
        assert_eq!(refreshed.access_issued_at, later);
        assert_eq!(refreshed.refresh_issued_at, issued);
    }

    #[test]
    fn test_store_save_load_clear() {
        let store = temp_store("roundtrip");
        let tokens = TokenSet::from_grant(response(), Utc::now());
        store.save(&tokens).unwrap();
        assert_eq!(store.load(), Some(tokens));
        store.clear().unwrap();
        assert_eq!(store.load(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_store_ignores_garbage() {
        let store = temp_store("garbage");
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), None);
        store.clear().unwrap();
    }
}
