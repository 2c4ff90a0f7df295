//! Error types for authentication operations

/// Errors that can occur during authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid app credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Token endpoint returned an error
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or redirect URL
    #[error("Parse error: {0}")]
    Parse(String),

    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// Token file could not be read or written
    #[error("Token store error: {0}")]
    Store(#[from] std::io::Error),

    /// No usable refresh token; the browser login must be repeated
    #[error("Re-authentication required: {0}")]
    ReauthRequired(String),
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
