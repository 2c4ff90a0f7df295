//! Error types for the streaming client

use std::time::Duration;
use thiserror::Error;

/// Main error type for streamer operations
#[derive(Error, Debug)]
pub enum SchwabError {
    // === Connection Errors ===
    /// Failed to establish WebSocket connection
    #[error("Failed to connect to {url}: {source}")]
    ConnectionFailed {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection attempt timed out
    #[error("Connection timeout after {timeout:?} to {url}")]
    ConnectionTimeout { url: String, timeout: Duration },

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// No heartbeat or data arrived within the watchdog window
    #[error("No heartbeat received for {elapsed:?}")]
    HeartbeatTimeout { elapsed: Duration },

    // === Protocol Errors ===
    /// Failed to parse JSON message
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String, raw: Option<String> },

    /// Streamer rejected the LOGIN request
    #[error("Streamer login failed (code {code}): {message}")]
    LoginFailed { code: i64, message: String },

    /// Streamer ended the session with an admin notice
    #[error("Streamer ended session (code {code}): {message}")]
    SessionEnded { code: i64, message: String },

    /// Streamer credentials could not be obtained
    #[error("Streamer authentication failed: {0}")]
    Authentication(String),

    // === Lifecycle Errors ===
    /// Streamer is not running
    #[error("Streamer is not running")]
    NotRunning,

    /// Streamer thread could not be spawned
    #[error("Failed to spawn streamer thread: {0}")]
    ThreadSpawn(String),

    /// Internal channel was closed unexpectedly
    #[error("Internal channel closed unexpectedly")]
    ChannelClosed,

    /// Shutdown in progress
    #[error("Shutdown in progress")]
    ShuttingDown,

    /// Invalid state transition
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SchwabError {
    /// Returns true if this error is potentially recoverable via retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::ConnectionTimeout { .. }
                | Self::WebSocket(_)
                | Self::HeartbeatTimeout { .. }
        )
    }

    /// Create an invalid JSON error keeping the raw payload
    pub fn invalid_json(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
            raw: Some(raw.into()),
        }
    }
}

/// Result type alias for streamer operations
pub type SchwabResult<T> = Result<T, SchwabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SchwabError::WebSocket("reset".into()).is_retryable());
        assert!(SchwabError::HeartbeatTimeout {
            elapsed: Duration::from_secs(31)
        }
        .is_retryable());
        assert!(!SchwabError::LoginFailed {
            code: 3,
            message: "bad token".into()
        }
        .is_retryable());
        assert!(!SchwabError::Configuration("x".into()).is_retryable());
        let ended = SchwabError::SessionEnded {
            code: 12,
            message: "closed".into(),
        };
        assert!(!ended.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SchwabError::LoginFailed {
            code: 3,
            message: "Login denied".into(),
        };
        assert_eq!(err.to_string(), "Streamer login failed (code 3): Login denied");
    }
}
