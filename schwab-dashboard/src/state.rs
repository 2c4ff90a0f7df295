//! Shared dashboard state

use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::integration::RealtimeIntegration;
use crate::realtime::RealtimeBuffers;
use parking_lot::RwLock;
use schwab_data::DataManager;
use schwab_stream::StreamData;
use schwab_types::DataType;
use std::sync::Arc;
use tracing::info;

/// Everything the HTTP handlers work with
#[derive(Debug)]
pub struct DashboardState {
    manager: Arc<DataManager>,
    symbols: RwLock<Vec<String>>,
    realtime: RealtimeIntegration,
    buffers: Arc<RealtimeBuffers>,
}

impl DashboardState {
    /// Wire the buffers to the manager's streamer
    pub fn new(manager: Arc<DataManager>, config: &DashboardConfig) -> Self {
        let buffers = Arc::new(RealtimeBuffers::new());
        let realtime = RealtimeIntegration::new(Arc::clone(&manager))
            .with_update_interval(config.update_interval);
        Self::with_realtime(manager, config, realtime, buffers)
    }

    /// Use a preconfigured integration and buffers
    pub fn with_realtime(
        manager: Arc<DataManager>,
        config: &DashboardConfig,
        realtime: RealtimeIntegration,
        buffers: Arc<RealtimeBuffers>,
    ) -> Self {
        for data_type in [DataType::Quote, DataType::Option] {
            let buffers = Arc::clone(&buffers);
            realtime.register_callback(data_type, move |data: &StreamData| buffers.handle_update(data));
        }

        Self {
            manager,
            symbols: RwLock::new(config.symbols.clone()),
            realtime,
            buffers,
        }
    }

    pub fn manager(&self) -> &Arc<DataManager> {
        &self.manager
    }

    pub fn realtime(&self) -> &RealtimeIntegration {
        &self.realtime
    }

    pub fn buffers(&self) -> &RealtimeBuffers {
        &self.buffers
    }

    /// Symbols currently shown
    pub fn symbols(&self) -> Vec<String> {
        self.symbols.read().clone()
    }

    /// Add a symbol, upper-cased; repeats are ignored
    pub fn add_symbol(&self, symbol: &str) -> DashboardResult<Vec<String>> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(DashboardError::BadRequest("empty symbol".into()));
        }

        let mut symbols = self.symbols.write();
        if !symbols.contains(&symbol) {
            info!("Added symbol {}", symbol);
            symbols.push(symbol);
        }
        Ok(symbols.clone())
    }

    /// Remove the symbol at a position of the list
    pub fn remove_symbol(&self, index: usize) -> DashboardResult<Vec<String>> {
        let mut symbols = self.symbols.write();
        if index >= symbols.len() {
            return Err(DashboardError::SymbolIndex(index));
        }
        let removed = symbols.remove(index);
        info!("Removed symbol {}", removed);
        Ok(symbols.clone())
    }
}
