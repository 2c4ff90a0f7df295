//! Error types for the dashboard

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use schwab_data::DataError;
use schwab_rest::RestError;
use schwab_types::SchwabError;
use thiserror::Error;

/// Dashboard errors
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Data manager failed
    #[error(transparent)]
    Data(#[from] DataError),

    /// Streamer failed
    #[error("Streaming error: {0}")]
    Stream(#[from] SchwabError),

    /// Time period was not of the form `<type>_<count>`
    #[error("Invalid time period: {0}")]
    InvalidPeriod(String),

    /// Request carried an unusable value
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No symbol at the requested position
    #[error("No symbol at index {0}")]
    SymbolIndex(usize),

    /// Environment variable held an unusable value
    #[error("Invalid value for {name}: {value}")]
    InvalidConfig { name: &'static str, value: String },

    /// Background task failed to complete
    #[error("Task failed: {0}")]
    Task(String),
}

/// Result type for dashboard operations
pub type DashboardResult<T> = Result<T, DashboardError>;

impl DashboardError {
    /// HTTP status reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPeriod(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::SymbolIndex(_) => StatusCode::NOT_FOUND,
            Self::Data(DataError::Rest(RestError::InvalidParameter(_))) => StatusCode::BAD_REQUEST,
            Self::Data(DataError::Rest(e)) if e.is_unauthorized() => StatusCode::UNAUTHORIZED,
            Self::Data(DataError::Rest(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (
            status,
            Json(serde_json::json!({"ok": false, "error": self.to_string()})),
        )
            .into_response()
    }
}
