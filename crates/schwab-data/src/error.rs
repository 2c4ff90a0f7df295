//! Error types for data management

use schwab_rest::RestError;
use schwab_types::SchwabError;

/// Errors from the data manager
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// REST request failed
    #[error("REST error: {0}")]
    Rest(#[from] RestError),

    /// Streaming failed
    #[error("Streaming error: {0}")]
    Stream(#[from] SchwabError),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV content could not be read
    #[error("CSV error on line {line}: {message}")]
    Csv { line: usize, message: String },

    /// Requested file format is not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl DataError {
    pub(crate) fn csv(line: usize, message: impl Into<String>) -> Self {
        Self::Csv {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for data operations
pub type DataResult<T> = Result<T, DataError>;
