//! Error types for REST API operations

use schwab_auth::AuthError;

/// Errors that can occur during REST API operations
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No valid access token could be obtained
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// API returned a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error detail from the response body
        message: String,
    },

    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The API returned no data for a symbol
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),
}

impl RestError {
    /// Build an API error from a status code and raw response body
    pub fn from_response(status: u16, body: &str) -> Self {
        Self::Api {
            status,
            message: error_detail(body).unwrap_or_else(|| body.trim().to_string()),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Auth(_) | Self::Parse(_) | Self::InvalidParameter(_) | Self::SymbolNotFound(_) => {
                false
            }
        }
    }

    /// Check if the access token was rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. }) || matches!(self, Self::Auth(_))
    }
}

/// Pull a human-readable message out of an error body
///
/// Handles `{"message": ...}`, `{"error": ...}` and
/// `{"errors": [{"title": ..., "detail": ...}]}`.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(msg) = value.get("message").and_then(|v| v.as_str()) {
        return Some(msg.to_string());
    }
    if let Some(msg) = value.get("error").and_then(|v| v.as_str()) {
        return Some(msg.to_string());
    }
    let errors = value.get("errors")?.as_array()?;
    let parts: Vec<String> = errors
        .iter()
        .filter_map(|e| {
            e.get("detail")
                .or_else(|| e.get("title"))
                .and_then(|v| v.as_str())
                .map(String::from)
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;
