//! Process-wide streamer singleton
//!
//! Only one streamer connection may be open per account, so every part of
//! the application shares one [`Streamer`]. The connection runs on a
//! dedicated OS thread with its own single-threaded tokio runtime; callers
//! interact with it through synchronous methods and registered handlers.

use crate::auth::StreamerAuth;
use crate::connection::{ConnectionConfig, ConnectionState, StreamerConnection};
use crate::handlers::{HandlerId, HandlerRegistry};
use crate::records::StreamData;
use crate::subscription::{parse_fields, SubscriptionManager};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use schwab_types::{DataType, SchwabError, SchwabResult};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Bounded wait for the streamer thread to exit
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

static INSTANCE: OnceLock<Arc<Streamer>> = OnceLock::new();

/// Snapshot of the streamer for status displays
#[derive(Debug, Clone, Serialize)]
pub struct StreamerStatus {
    pub state: String,
    pub running: bool,
    /// Active `SYMBOL_FIELD` keys
    pub subscriptions: Vec<String>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub connection_id: Option<String>,
    pub messages_received: u64,
}

struct Inner {
    auth: Arc<dyn StreamerAuth>,
    connection: Option<Arc<StreamerConnection>>,
    thread: Option<JoinHandle<()>>,
}

/// Streaming client shared by the whole process
///
/// # Example
///
/// ```no_run
/// use schwab_stream::{StaticStreamerAuth, Streamer};
/// use schwab_types::DataType;
/// use std::sync::Arc;
///
/// let auth = Arc::new(StaticStreamerAuth::for_url("wss://streamer-api.schwab.com/ws", "token"));
/// let streamer = Streamer::get_instance(auth);
/// streamer.register_handler(DataType::Quote, |data| println!("{:?}", data));
/// streamer.start_streaming(&["AAPL", "MSFT"], &["QUOTE"]).unwrap();
/// ```
pub struct Streamer {
    inner: Mutex<Inner>,
    config: ConnectionConfig,
    subscriptions: Arc<RwLock<SubscriptionManager>>,
    handlers: Arc<HandlerRegistry>,
}

impl std::fmt::Debug for Streamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streamer")
            .field("running", &self.is_running())
            .field("subscriptions", &self.subscriptions.read().count())
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl Streamer {
    /// Create a standalone streamer
    ///
    /// Applications normally use [`Streamer::get_instance`]; separate
    /// instances are for tests and tools that need their own session.
    pub fn new(auth: Arc<dyn StreamerAuth>, config: ConnectionConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                auth,
                connection: None,
                thread: None,
            }),
            config,
            subscriptions: Arc::new(RwLock::new(SubscriptionManager::new())),
            handlers: Arc::new(HandlerRegistry::new()),
        }
    }

    /// The process-wide streamer, created on first call
    ///
    /// Later calls return the existing instance and ignore `auth`; use
    /// [`Streamer::set_auth`] to replace credentials.
    pub fn get_instance(auth: Arc<dyn StreamerAuth>) -> Arc<Streamer> {
        Self::get_instance_with_config(auth, ConnectionConfig::default())
    }

    /// Like [`Streamer::get_instance`] with a connection config for the first call
    pub fn get_instance_with_config(auth: Arc<dyn StreamerAuth>, config: ConnectionConfig) -> Arc<Streamer> {
        Arc::clone(INSTANCE.get_or_init(|| {
            info!("Creating streamer instance");
            Arc::new(Streamer::new(auth, config))
        }))
    }

    /// The process-wide streamer if one was created
    pub fn instance() -> Option<Arc<Streamer>> {
        INSTANCE.get().cloned()
    }

    /// Start the connection on a dedicated thread
    ///
    /// Returns `Ok(false)` without doing anything when already running.
    pub fn start(&self) -> SchwabResult<bool> {
        let mut inner = self.inner.lock();
        if Self::running(&inner) {
            warn!("Streamer already running, not starting again");
            return Ok(false);
        }

        Self::stop_locked(&mut inner);

        info!("Starting streamer in dedicated thread");
        let connection = Arc::new(StreamerConnection::new(
            self.config.clone(),
            Arc::clone(&inner.auth),
            Arc::clone(&self.subscriptions),
            Arc::clone(&self.handlers),
        ));

        let worker = Arc::clone(&connection);
        let thread = thread::Builder::new()
            .name("schwab-streamer".into())
            .spawn(move || run_connection(worker))
            .map_err(|e| SchwabError::ThreadSpawn(e.to_string()))?;

        inner.connection = Some(connection);
        inner.thread = Some(thread);
        info!("Streamer thread started");
        Ok(true)
    }

    /// Stop streaming and clear subscriptions; a no-op when stopped
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        Self::stop_locked(&mut inner);
        self.subscriptions.write().clear();
    }

    /// Alias of [`Streamer::stop`]
    pub fn stop_streaming(&self) {
        self.stop();
    }

    /// Replace the credentials, restarting a running streamer
    pub fn set_auth(&self, auth: Arc<dyn StreamerAuth>) -> SchwabResult<()> {
        let was_running = {
            let mut inner = self.inner.lock();
            inner.auth = auth;
            let running = Self::running(&inner);
            if running {
                info!("Credentials replaced, restarting streamer");
                Self::stop_locked(&mut inner);
            }
            running
        };
        if was_running {
            self.start()?;
        }
        Ok(())
    }

    /// Whether the thread is alive and its connection loop active
    pub fn is_running(&self) -> bool {
        Self::running(&self.inner.lock())
    }

    fn running(inner: &Inner) -> bool {
        let thread_alive = inner.thread.as_ref().is_some_and(|t| !t.is_finished());
        let connection_active = inner.connection.as_ref().is_some_and(|c| c.is_active());
        thread_alive && connection_active
    }

    fn stop_locked(inner: &mut Inner) {
        if let Some(connection) = inner.connection.take() {
            info!("Stopping streamer");
            connection.shutdown();
        }
        if let Some(thread) = inner.thread.take() {
            join_with_timeout(thread, JOIN_TIMEOUT);
        }
    }

    /// Start if needed and subscribe to symbols
    ///
    /// `fields` takes `QUOTE` and `OPTION`; empty means `QUOTE`.
    pub fn start_streaming<S, F>(&self, symbols: &[S], fields: &[F]) -> SchwabResult<bool>
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        if !self.is_running() {
            self.start()?;
        }
        self.add_subscriptions(symbols, fields)?;
        Ok(true)
    }

    /// Subscribe to more symbols; returns how many symbol/field pairs were new
    pub fn add_subscriptions<S, F>(&self, symbols: &[S], fields: &[F]) -> SchwabResult<usize>
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        let data_types = parse_fields(fields);
        if data_types.is_empty() {
            return Err(SchwabError::Configuration("no valid subscription fields".into()));
        }

        let connection = self.inner.lock().connection.clone();
        let mut added = 0;
        for data_type in data_types {
            let Some(sub) = self.subscriptions.write().add(symbols, data_type) else {
                continue;
            };
            added += sub.symbols.len();
            match &connection {
                Some(conn) if conn.send_subscription(&sub) => {}
                _ => info!(
                    "Queued {} subscription for {} until the streamer logs in",
                    data_type,
                    sub.symbols.join(",")
                ),
            }
        }
        Ok(added)
    }

    /// Stop receiving symbols; returns how many symbol/field pairs were dropped
    pub fn remove_subscriptions<S, F>(&self, symbols: &[S], fields: &[F]) -> SchwabResult<usize>
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        let data_types = parse_fields(fields);
        if data_types.is_empty() {
            return Err(SchwabError::Configuration("no valid subscription fields".into()));
        }

        let connection = self.inner.lock().connection.clone();
        let mut removed = 0;
        for data_type in data_types {
            let Some(sub) = self.subscriptions.write().remove(symbols, data_type) else {
                continue;
            };
            removed += sub.symbols.len();
            info!("Removed {} subscription for {}", data_type, sub.symbols.join(","));
            if let Some(conn) = &connection {
                conn.send_unsubscription(&sub);
            }
        }
        Ok(removed)
    }

    /// Register a callback for a data type
    pub fn register_handler<F>(&self, data_type: DataType, handler: F) -> HandlerId
    where
        F: Fn(&StreamData) + Send + Sync + 'static,
    {
        self.handlers.register(data_type, handler)
    }

    /// The handler registry
    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    /// Active `SYMBOL_FIELD` subscription keys
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.read().keys()
    }

    /// Current status snapshot
    pub fn status(&self) -> StreamerStatus {
        let inner = self.inner.lock();
        let running = Self::running(&inner);
        let connection = inner.connection.as_ref();
        StreamerStatus {
            state: connection
                .map_or(ConnectionState::Disconnected, |c| c.state())
                .to_string(),
            running,
            subscriptions: self.subscriptions.read().keys(),
            last_heartbeat: connection.and_then(|c| c.last_heartbeat()),
            connection_id: connection.and_then(|c| c.connection_id()),
            messages_received: connection.map_or(0, |c| c.messages_received()),
        }
    }

    /// Live connection, if started
    pub fn connection(&self) -> Option<Arc<StreamerConnection>> {
        self.inner.lock().connection.clone()
    }
}

/// Thread body: a current-thread runtime driving the connection loop
fn run_connection(connection: Arc<StreamerConnection>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to build streamer runtime: {}", e);
            connection.shutdown();
            return;
        }
    };

    info!("Running streamer event loop");
    if let Err(e) = runtime.block_on(connection.connect_and_run()) {
        error!("Streamer stopped: {}", e);
    }
    info!("Streamer thread terminated");
}

/// Join a thread, giving up after `timeout`
///
/// std has no timed join, so poll `is_finished`. A thread still running at
/// the deadline is detached; it exits on its own once its loop sees the
/// shutdown flag.
fn join_with_timeout(thread: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !thread.is_finished() {
        if Instant::now() >= deadline {
            warn!("Streamer thread did not exit within {:?}, detaching", timeout);
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if thread.join().is_err() {
        error!("Streamer thread panicked");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticStreamerAuth;
    use crate::reconnect::ReconnectConfig;

    fn unreachable_streamer() -> Streamer {
        // Port 9 (discard) is closed on test machines, so connects fail fast
        let auth = Arc::new(StaticStreamerAuth::for_url("ws://127.0.0.1:9", "tok"));
        let config = ConnectionConfig::new()
            .with_timeout(Duration::from_millis(200))
            .with_reconnect(ReconnectConfig::new().with_initial_delay(Duration::from_secs(5)));
        Streamer::new(auth, config)
    }

    #[test]
    fn test_not_running_initially() {
        let streamer = unreachable_streamer();
        assert!(!streamer.is_running());
        let status = streamer.status();
        assert_eq!(status.state, "disconnected");
        assert!(!status.running);
        assert!(status.subscriptions.is_empty());
    }

    #[test]
    fn test_start_twice_is_noop() {
        let streamer = unreachable_streamer();
        assert!(streamer.start().unwrap());
        assert!(!streamer.start().unwrap());
        streamer.stop();
        assert!(!streamer.is_running());
        // Stopping again is fine
        streamer.stop();
    }

    #[test]
    fn test_subscriptions_queued_and_cleared_on_stop() {
        let streamer = unreachable_streamer();
        assert!(streamer.start_streaming(&["aapl", "MSFT"], &["QUOTE", "OPTION"]).unwrap());
        assert_eq!(
            streamer.subscriptions(),
            vec!["AAPL_OPTION", "AAPL_QUOTE", "MSFT_OPTION", "MSFT_QUOTE"]
        );
        assert_eq!(streamer.add_subscriptions(&["AAPL"], &[] as &[&str]).unwrap(), 0);

        streamer.stop_streaming();
        assert!(streamer.subscriptions().is_empty());
    }

    #[test]
    fn test_remove_subscriptions_while_disconnected() {
        let streamer = unreachable_streamer();
        streamer.add_subscriptions(&["AAPL", "MSFT"], &["QUOTE", "OPTION"]).unwrap();

        let removed = streamer.remove_subscriptions(&["msft", "TSLA"], &["QUOTE"]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            streamer.subscriptions(),
            vec!["AAPL_OPTION", "AAPL_QUOTE", "MSFT_OPTION"]
        );
        assert_eq!(streamer.remove_subscriptions(&["MSFT"], &["QUOTE"]).unwrap(), 0);
        assert!(streamer.remove_subscriptions(&["AAPL"], &["BOOK"]).is_err());
    }

    #[test]
    fn test_invalid_fields_rejected() {
        let streamer = unreachable_streamer();
        let err = streamer.add_subscriptions(&["AAPL"], &["BOOK"]).unwrap_err();
        assert!(matches!(err, SchwabError::Configuration(_)));
    }

    #[test]
    fn test_join_with_timeout() {
        let quick = thread::spawn(|| {});
        assert!(join_with_timeout(quick, Duration::from_secs(1)));

        let slow = thread::spawn(|| thread::sleep(Duration::from_millis(500)));
        assert!(!join_with_timeout(slow, Duration::from_millis(20)));
    }
}
