//! REST API client for the Schwab market data and trader APIs
//!
//! Covers the endpoints the dashboard uses: quotes, price history, option
//! chains, linked accounts and the user preferences that carry the
//! streamer connection details.
//!
//! # Example
//!
//! ```no_run
//! use schwab_rest::{OptionChainRequest, SchwabRestClient, StaticToken};
//! use schwab_types::ContractType;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SchwabRestClient::new(Arc::new(StaticToken::new("access-token")))?;
//!
//!     let chain = client
//!         .get_option_chain(&OptionChainRequest::new("AAPL").with_contract_type(ContractType::Call))
//!         .await?;
//!     println!("{} expirations", chain.expiration_dates().len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoints;
pub mod error;
pub mod token_source;
pub mod types;

pub use client::{ClientConfig, SchwabRestClient, DEFAULT_BASE_URL};
pub use error::{RestError, RestResult};
pub use token_source::{StaticToken, TokenSource};
pub use types::{LinkedAccount, OptionChainRequest, PriceHistoryRequest, UserPreference};
