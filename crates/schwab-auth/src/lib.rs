//! OAuth credentials and token management for the Schwab API
//!
//! This crate covers the thin OAuth plumbing the rest of the workspace
//! needs: app credentials, the token set with its expiry rules, a JSON
//! token file, and a provider that exchanges codes and refreshes tokens.
//!
//! # Example
//!
//! ```no_run
//! use schwab_auth::TokenProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = TokenProvider::from_env()?;
//!
//!     if !provider.check_authentication().await {
//!         println!("Visit {}", provider.authorization_url()?);
//!         return Ok(());
//!     }
//!
//!     let token = provider.access_token().await?;
//!     println!("Token: {}...", &token[..8.min(token.len())]);
//!     Ok(())
//! }
//! ```

mod credentials;
mod error;
mod provider;
mod token;

pub use credentials::{Credentials, DEFAULT_CALLBACK_URL};
pub use error::{AuthError, AuthResult};
pub use provider::{TokenProvider, OAUTH_BASE_URL};
pub use token::{
    TokenSet, TokenStore, ACCESS_TOKEN_TTL_SECS, DEFAULT_TOKENS_FILE, EXPIRY_MARGIN_SECS,
    REFRESH_TOKEN_TTL_SECS,
};
