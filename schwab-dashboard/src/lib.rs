//! Real-time market data dashboard for the Schwab API
//!
//! The dashboard keeps a list of symbols, charts their price history and
//! switches to streamed quotes when real-time mode is on. It serves JSON
//! figures and tables over HTTP:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /health` | Liveness |
//! | `GET/POST /api/symbols`, `DELETE /api/symbols/:index` | Symbol list |
//! | `GET /api/history?period=day_1` | Histories with price and volume figures |
//! | `GET /api/options/:symbol?type=calls` | Option table, expirations and metrics |
//! | `GET /api/data-table/:symbol` | First rows of a history |
//! | `POST /api/realtime`, `GET /api/realtime/status` | Streaming control |
//!
//! # Example
//!
//! ```no_run
//! use schwab_dashboard::{routes, DashboardConfig, DashboardState};
//! use schwab_data::DataManager;
//! use std::sync::Arc;
//!
//! # async fn serve(manager: DataManager) -> Result<(), Box<dyn std::error::Error>> {
//! let config = DashboardConfig::from_env()?;
//! let state = Arc::new(DashboardState::new(Arc::new(manager), &config));
//! let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//! axum::serve(listener, routes::router(state)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod figures;
pub mod integration;
pub mod period;
pub mod realtime;
pub mod routes;
pub mod state;
pub mod tables;

pub use config::{DashboardConfig, DEFAULT_SYMBOLS};
pub use error::{DashboardError, DashboardResult};
pub use figures::Figure;
pub use integration::{RealtimeIntegration, StreamingStatus};
pub use period::{determine_frequency, parse_time_period};
pub use realtime::{RealtimeBuffers, MAX_POINTS};
pub use state::DashboardState;
pub use tables::OptionMetrics;
