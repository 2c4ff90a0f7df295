//! Data management for the Schwab dashboard
//!
//! [`DataManager`] combines REST price history, quotes and option chains
//! with the shared real-time [`Streamer`](schwab_stream::Streamer), caches
//! price history per request, and saves or loads data files as CSV or JSON.

pub mod error;
pub mod manager;
pub mod store;
pub mod table;

pub use error::{DataError, DataResult};
pub use manager::{cache_key, DataManager};
pub use store::{timestamped_file_name, DataFormat, SavedData};
pub use table::Table;
