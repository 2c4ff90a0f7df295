//! Shared types for the Schwab market data and streamer APIs
//!
//! This crate provides the core type definitions used across the workspace.
//! It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`PriceHistory`], [`Candle`] - Historical bars
//! - [`QuoteEntry`], [`Quote`] - Snapshot quotes
//! - [`OptionChain`], [`OptionContract`] - Option chains
//! - [`PeriodType`], [`FrequencyType`], [`ContractType`] - Request enums
//! - [`Service`], [`DataType`] - Streamer services and handler keys
//! - [`StreamRequest`], [`StreamMessage`] - Streamer wire messages
//! - [`SchwabError`] - Error types

pub mod enums;
pub mod error;
pub mod market;
pub mod messages;

// Re-export commonly used types
pub use enums::*;
pub use error::*;
pub use market::*;
pub use messages::*;
