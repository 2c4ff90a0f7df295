//! Data handler registry
//!
//! Handlers are plain callbacks keyed by [`DataType`]. Each incoming record
//! is passed to every handler registered for its type, in registration
//! order. A handler that panics is logged and skipped; the remaining
//! handlers still run.
//!
//! # Example
//!
//! ```
//! use schwab_stream::HandlerRegistry;
//! use schwab_types::DataType;
//!
//! let registry = HandlerRegistry::new();
//! registry.register(DataType::Quote, |data| {
//!     println!("{} updated", data.symbol());
//! });
//! assert_eq!(registry.count(DataType::Quote), 1);
//! ```

use crate::records::StreamData;
use parking_lot::RwLock;
use schwab_types::DataType;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Callback invoked with each record of the registered type
pub type DataHandler = Arc<dyn Fn(&StreamData) + Send + Sync>;

/// Identifies a registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Handlers keyed by data type
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<DataType, Vec<(HandlerId, DataHandler)>>>,
    next_id: AtomicU64,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        f.debug_struct("HandlerRegistry")
            .field("quote", &handlers.get(&DataType::Quote).map_or(0, Vec::len))
            .field("option", &handlers.get(&DataType::Option).map_or(0, Vec::len))
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback for a data type
    pub fn register<F>(&self, data_type: DataType, handler: F) -> HandlerId
    where
        F: Fn(&StreamData) + Send + Sync + 'static,
    {
        self.register_arc(data_type, Arc::new(handler))
    }

    /// Register an already shared callback
    pub fn register_arc(&self, data_type: DataType, handler: DataHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(data_type)
            .or_default()
            .push((id, handler));
        info!("Registered handler for {} data", data_type);
        id
    }

    /// Remove a handler; returns false if it was not registered
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(hid, _)| *hid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Number of handlers registered for a data type
    pub fn count(&self, data_type: DataType) -> usize {
        self.handlers.read().get(&data_type).map_or(0, Vec::len)
    }

    /// Remove every handler
    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    /// Invoke every handler registered for the record's type
    ///
    /// Returns how many handlers completed without panicking.
    pub fn dispatch(&self, data: &StreamData) -> usize {
        // Snapshot so handlers may register or unregister while running
        let handlers: Vec<(HandlerId, DataHandler)> = match self.handlers.read().get(&data.data_type()) {
            Some(list) => list.clone(),
            None => {
                debug!("No handlers for {} data", data.data_type());
                return 0;
            }
        };

        let mut completed = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(data))) {
                Ok(()) => completed += 1,
                Err(payload) => {
                    error!(
                        "Error in {} handler {:?} for {}: {}",
                        data.data_type(),
                        id,
                        data.symbol(),
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        completed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
