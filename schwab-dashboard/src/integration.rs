//! Real-time streaming control for the dashboard
//!
//! [`RealtimeIntegration`] starts and stops the shared streamer for a set
//! of symbols, fans every received record out to the dashboard's
//! callbacks and records when each symbol last updated. While streaming is
//! active a monitor thread restarts the stream when a symbol goes quiet.

use crate::error::{DashboardError, DashboardResult};
use chrono::{DateTime, Local};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use schwab_data::DataManager;
use schwab_stream::{HandlerId, HandlerRegistry, StreamData};
use schwab_types::DataType;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// Default interval between stream monitor checks
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5);

/// A symbol with no update for longer than this triggers a restart
pub const STALE_AFTER: Duration = Duration::from_secs(60);

/// Pause between stopping and restarting a stale stream
pub const RESTART_PAUSE: Duration = Duration::from_secs(1);

const STATUS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Snapshot returned by [`RealtimeIntegration::streaming_status`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamingStatus {
    pub active: bool,
    pub symbols: Vec<String>,
    /// Last update per symbol, `%Y-%m-%d %H:%M:%S` local time
    pub last_updates: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
struct MonitorSettings {
    interval: Duration,
    stale_after: Duration,
    restart_pause: Duration,
}

/// State shared with the streamer handlers and the monitor thread
#[derive(Debug, Default)]
struct Shared {
    active: AtomicBool,
    symbols: RwLock<Vec<String>>,
    fields: RwLock<Vec<String>>,
    callbacks: HandlerRegistry,
    last_update: DashMap<String, DateTime<Local>>,
}

impl Shared {
    fn record(&self, data: &StreamData) {
        self.last_update.insert(data.symbol().to_string(), Local::now());
        self.callbacks.dispatch(data);
    }

    /// First streaming symbol whose last update is older than `stale_after`
    fn stale_symbol(&self, now: DateTime<Local>, stale_after: Duration) -> Option<String> {
        self.symbols.read().iter().find_map(|symbol| {
            let last = *self.last_update.get(symbol)?;
            let silent = (now - last).to_std().ok()?;
            (silent > stale_after).then(|| symbol.clone())
        })
    }
}

struct Monitor {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// Streaming lifecycle and callback fan-out for the dashboard
pub struct RealtimeIntegration {
    manager: Arc<DataManager>,
    settings: MonitorSettings,
    shared: Arc<Shared>,
    handler_ids: Vec<HandlerId>,
    monitor: Mutex<Option<Monitor>>,
}

impl std::fmt::Debug for RealtimeIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeIntegration")
            .field("active", &self.is_active())
            .field("symbols", &*self.shared.symbols.read())
            .field("update_interval", &self.settings.interval)
            .finish_non_exhaustive()
    }
}

impl RealtimeIntegration {
    /// Attach to the manager's streamer
    ///
    /// Quote and option records from the streamer are routed through this
    /// integration from now on; nothing is streamed until
    /// [`start_streaming`](Self::start_streaming).
    pub fn new(manager: Arc<DataManager>) -> Self {
        let shared = Arc::new(Shared::default());
        let handler_ids = [DataType::Quote, DataType::Option]
            .into_iter()
            .map(|data_type| {
                let shared = Arc::clone(&shared);
                manager
                    .streamer()
                    .register_handler(data_type, move |data| shared.record(data))
            })
            .collect();

        Self {
            manager,
            settings: MonitorSettings {
                interval: DEFAULT_UPDATE_INTERVAL,
                stale_after: STALE_AFTER,
                restart_pause: RESTART_PAUSE,
            },
            shared,
            handler_ids,
            monitor: Mutex::new(None),
        }
    }

    /// Interval between monitor checks
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.settings.interval = interval;
        self
    }

    /// Silence after which a symbol counts as stale
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.settings.stale_after = stale_after;
        self
    }

    /// Pause between stop and start when restarting
    pub fn with_restart_pause(mut self, pause: Duration) -> Self {
        self.settings.restart_pause = pause;
        self
    }

    pub fn update_interval(&self) -> Duration {
        self.settings.interval
    }

    /// Register a callback for records of one type
    pub fn register_callback<F>(&self, data_type: DataType, callback: F) -> HandlerId
    where
        F: Fn(&StreamData) + Send + Sync + 'static,
    {
        self.shared.callbacks.register(data_type, callback)
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn streaming_symbols(&self) -> Vec<String> {
        self.shared.symbols.read().clone()
    }

    /// When a symbol last received a record
    pub fn last_update(&self, symbol: &str) -> Option<DateTime<Local>> {
        self.shared.last_update.get(symbol).map(|t| *t)
    }

    /// Start streaming the symbols and the stream monitor
    ///
    /// Returns `Ok(false)` when streaming is already active. `fields` are
    /// data type names (`QUOTE`, `OPTION`); empty means quotes.
    pub fn start_streaming<S, F>(&self, symbols: &[S], fields: &[F]) -> DashboardResult<bool>
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        let mut monitor = self.monitor.lock();
        if self.is_active() {
            warn!("Real-time streaming is already active");
            return Ok(false);
        }

        let symbols: Vec<String> = symbols
            .iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return Err(DashboardError::BadRequest("no symbols to stream".into()));
        }
        let fields: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();

        self.manager
            .start_streaming(&symbols, &fields, std::iter::empty())?;

        *self.shared.symbols.write() = symbols.clone();
        *self.shared.fields.write() = fields;
        self.shared.active.store(true, Ordering::SeqCst);

        match self.spawn_monitor() {
            Ok(m) => *monitor = Some(m),
            Err(e) => {
                self.shared.active.store(false, Ordering::SeqCst);
                self.shared.symbols.write().clear();
                self.manager.stop_streaming();
                return Err(e);
            }
        }

        info!("Started real-time streaming for {}", symbols.join(", "));
        Ok(true)
    }

    /// Stop streaming and the stream monitor
    ///
    /// Returns false when streaming was not active. Clears the streaming
    /// symbols and last-update times.
    pub fn stop_streaming(&self) -> bool {
        let mut monitor = self.monitor.lock();
        if !self.is_active() {
            warn!("Real-time streaming is not active");
            return false;
        }

        self.shared.active.store(false, Ordering::SeqCst);
        if let Some(m) = monitor.take() {
            let _ = m.stop_tx.send(());
            if m.thread.join().is_err() {
                error!("Stream monitor panicked");
            }
        }
        self.manager.stop_streaming();

        self.shared.symbols.write().clear();
        self.shared.last_update.clear();
        info!("Stopped real-time streaming");
        true
    }

    /// Whether streaming is active, what is streamed and when each symbol
    /// last updated
    pub fn streaming_status(&self) -> StreamingStatus {
        StreamingStatus {
            active: self.is_active(),
            symbols: self.streaming_symbols(),
            last_updates: self
                .shared
                .last_update
                .iter()
                .map(|e| (e.key().clone(), e.value().format(STATUS_TIME_FORMAT).to_string()))
                .collect(),
        }
    }

    fn spawn_monitor(&self) -> DashboardResult<Monitor> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let manager = Arc::clone(&self.manager);
        let shared = Arc::clone(&self.shared);
        let settings = self.settings;

        let thread = thread::Builder::new()
            .name("schwab-stream-monitor".into())
            .spawn(move || run_monitor(manager, shared, settings, stop_rx))
            .map_err(|e| DashboardError::Task(format!("failed to spawn stream monitor: {}", e)))?;
        Ok(Monitor { stop_tx, thread })
    }
}

impl Drop for RealtimeIntegration {
    fn drop(&mut self) {
        if let Some(m) = self.monitor.lock().take() {
            self.shared.active.store(false, Ordering::SeqCst);
            let _ = m.stop_tx.send(());
            let _ = m.thread.join();
        }
        for id in &self.handler_ids {
            self.manager.streamer().handlers().unregister(*id);
        }
    }
}

/// Wait for `timeout`; false when a stop was requested
fn wait(stop_rx: &mpsc::Receiver<()>, timeout: Duration) -> bool {
    matches!(stop_rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
}

fn run_monitor(
    manager: Arc<DataManager>,
    shared: Arc<Shared>,
    settings: MonitorSettings,
    stop_rx: mpsc::Receiver<()>,
) {
    while wait(&stop_rx, settings.interval) && shared.active.load(Ordering::SeqCst) {
        let Some(symbol) = shared.stale_symbol(Local::now(), settings.stale_after) else {
            continue;
        };

        warn!(
            "No updates received for {} in the last {}s",
            symbol,
            settings.stale_after.as_secs()
        );
        info!("Attempting to restart streaming");
        manager.stop_streaming();
        if !wait(&stop_rx, settings.restart_pause) {
            break;
        }

        let symbols = shared.symbols.read().clone();
        let fields = shared.fields.read().clone();
        if let Err(e) = manager.start_streaming(&symbols, &fields, std::iter::empty()) {
            error!("Failed to restart streaming: {}", e);
        }
    }
}
