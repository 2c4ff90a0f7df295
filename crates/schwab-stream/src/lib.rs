//! Streaming client for the Schwab streamer API
//!
//! This crate provides:
//! - A WebSocket connection with LOGIN, heartbeat watchdog and automatic
//!   reconnection with exponential backoff
//! - Subscription tracking with restoration after reconnect
//! - A handler registry invoking callbacks per data type, isolating
//!   callbacks that panic
//! - A process-wide [`Streamer`] that runs the connection on its own thread
//!
//! # Example
//!
//! ```no_run
//! use schwab_stream::{StaticStreamerAuth, StreamData, Streamer};
//! use schwab_types::DataType;
//! use std::sync::Arc;
//!
//! let auth = Arc::new(StaticStreamerAuth::for_url("wss://streamer-api.schwab.com/ws", "token"));
//! let streamer = Streamer::get_instance(auth);
//!
//! streamer.register_handler(DataType::Quote, |data| {
//!     if let StreamData::Quote(quote) = data {
//!         println!("{} last {:?}", quote.symbol, quote.last);
//!     }
//! });
//!
//! streamer.start_streaming(&["AAPL"], &["QUOTE"]).unwrap();
//! ```

pub mod auth;
pub mod connection;
pub mod events;
pub mod handlers;
pub mod reconnect;
pub mod records;
pub mod streamer;
pub mod subscription;

pub use auth::{RestStreamerAuth, StaticStreamerAuth, StreamerAuth};
pub use connection::{ConnectionConfig, ConnectionState, StreamerConnection};
pub use events::{ConnectionEvent, DisconnectReason, Event, SubscriptionEvent};
pub use handlers::{DataHandler, HandlerId, HandlerRegistry};
pub use reconnect::ReconnectConfig;
pub use records::{fields_for, OptionUpdate, QuoteUpdate, StreamData, OPTION_FIELDS, QUOTE_FIELDS};
pub use streamer::{Streamer, StreamerStatus, JOIN_TIMEOUT};
pub use subscription::{parse_fields, Subscription, SubscriptionManager};
