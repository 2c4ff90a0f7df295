//! Streamer WebSocket connection management

use crate::auth::StreamerAuth;
use crate::events::{ConnectionEvent, DisconnectReason, Event, SubscriptionEvent};
use crate::handlers::HandlerRegistry;
use crate::reconnect::ReconnectConfig;
use crate::records::StreamData;
use crate::subscription::{Subscription, SubscriptionManager};

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use schwab_types::{
    Command, DataItem, Notification, ResponseItem, SchwabError, SchwabResult, StreamMessage,
    StreamRequest, StreamerInfo,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{timeout, Duration, Instant};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};

/// Notice code: the streamer is closing this connection
pub const CODE_CLOSE_CONNECTION: i64 = 12;
/// Notice code: the streamer stopped streaming to this session
pub const CODE_STOP_STREAMING: i64 = 30;

/// Streamer connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connection or login in progress
    Connecting,
    /// Logged in and streaming
    Connected,
    /// Reconnecting after disconnect
    Reconnecting,
    /// Shutting down
    ShuttingDown,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::ShuttingDown => "shutting_down",
        };
        f.write_str(s)
    }
}

/// Configuration for the streamer connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Reconnection settings
    pub reconnect: ReconnectConfig,
    /// WebSocket connect timeout
    pub connect_timeout: Duration,
    /// How long to wait for the LOGIN response
    pub login_timeout: Duration,
    /// Drop the connection when no heartbeat or data arrives for this long
    pub heartbeat_timeout: Duration,
    /// Socket URL used instead of the one in the streamer info
    pub url_override: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(30),
            url_override: None,
        }
    }
}

impl ConnectionConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set reconnection config
    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = ReconnectConfig::disabled();
        self
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set LOGIN response timeout
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Set heartbeat watchdog timeout
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Connect to this URL instead of the advertised streamer socket
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url_override = Some(url.into());
        self
    }

    fn watchdog_interval(&self) -> Duration {
        (self.heartbeat_timeout / 4).clamp(Duration::from_millis(10), Duration::from_secs(1))
    }
}

/// WebSocket connection to the Schwab streamer
pub struct StreamerConnection {
    /// Configuration
    config: ConnectionConfig,
    /// Session info and token source
    auth: Arc<dyn StreamerAuth>,
    /// Connection state
    state: Arc<RwLock<ConnectionState>>,
    /// Subscription manager, shared across reconnects
    subscriptions: Arc<RwLock<SubscriptionManager>>,
    /// Data handlers
    handlers: Arc<HandlerRegistry>,
    /// Reconnection attempt counter
    reconnect_attempt: AtomicU32,
    /// Shutdown flag
    shutdown: AtomicBool,
    /// Wakes the message loop on shutdown
    shutdown_tx: watch::Sender<bool>,
    /// Set while `connect_and_run` is executing
    running: AtomicBool,
    /// Set once `connect_and_run` has returned
    exited: AtomicBool,
    /// Outbound requests for the live socket
    command_tx: Mutex<Option<mpsc::UnboundedSender<StreamRequest>>>,
    /// Session info of the live connection
    info: RwLock<Option<StreamerInfo>>,
    last_heartbeat: RwLock<Option<DateTime<Utc>>>,
    /// Value of the last heartbeat notification
    connection_id: RwLock<Option<String>>,
    messages_received: AtomicU64,
    /// Event sender
    event_tx: broadcast::Sender<Event>,
}

impl fmt::Debug for StreamerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamerConnection")
            .field("state", &self.state())
            .field("running", &self.is_running())
            .field("messages_received", &self.messages_received())
            .finish_non_exhaustive()
    }
}

impl StreamerConnection {
    /// Create a connection sharing the given subscriptions and handlers
    pub fn new(
        config: ConnectionConfig,
        auth: Arc<dyn StreamerAuth>,
        subscriptions: Arc<RwLock<SubscriptionManager>>,
        handlers: Arc<HandlerRegistry>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            auth,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            subscriptions,
            handlers,
            reconnect_attempt: AtomicU32::new(0),
            shutdown: AtomicBool::new(false),
            shutdown_tx,
            running: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            command_tx: Mutex::new(None),
            info: RwLock::new(None),
            last_heartbeat: RwLock::new(None),
            connection_id: RwLock::new(None),
            messages_received: AtomicU64::new(0),
            event_tx,
        }
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether the connection loop is executing
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Whether the loop has neither been told to stop nor exited
    pub fn is_active(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed) && !self.exited.load(Ordering::Relaxed)
    }

    /// Time of the last heartbeat
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        *self.last_heartbeat.read()
    }

    /// Identifier carried by the last heartbeat
    pub fn connection_id(&self) -> Option<String> {
        self.connection_id.read().clone()
    }

    /// Number of frames received over all connections
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Receive connection and subscription events
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Send a subscription over the live socket
    ///
    /// Returns false when not connected; the subscription is then sent
    /// with the restoration requests of the next login.
    pub fn send_subscription(&self, sub: &Subscription) -> bool {
        self.send_command(sub, Command::Add)
    }

    /// Send an UNSUBS for symbols already dropped from the subscription set
    ///
    /// Returns false when not connected; nothing needs sending then since
    /// the next login only restores what is still tracked.
    pub fn send_unsubscription(&self, sub: &Subscription) -> bool {
        self.send_command(sub, Command::Unsubs)
    }

    fn send_command(&self, sub: &Subscription, command: Command) -> bool {
        let Some(info) = self.info.read().clone() else {
            return false;
        };
        let command_tx = self.command_tx.lock();
        let Some(tx) = command_tx.as_ref() else {
            return false;
        };
        let request = self.subscriptions.write().request(sub, &info, command);
        tx.send(request).is_ok()
    }

    /// Connect and run the connection loop until shutdown or reconnects run out
    pub async fn connect_and_run(&self) -> SchwabResult<()> {
        self.running.store(true, Ordering::Relaxed);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let result = self.run_loop(&mut shutdown_rx).await;

        *self.command_tx.lock() = None;
        *self.info.write() = None;
        *self.state.write() = ConnectionState::Disconnected;
        self.running.store(false, Ordering::Relaxed);
        self.exited.store(true, Ordering::Relaxed);
        info!("Streamer connection loop finished");
        result
    }

    async fn run_loop(&self, shutdown_rx: &mut watch::Receiver<bool>) -> SchwabResult<()> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            {
                let mut state = self.state.write();
                if *state != ConnectionState::Reconnecting {
                    *state = ConnectionState::Connecting;
                }
            }

            match self.connect_internal(shutdown_rx).await {
                Ok(()) => break,
                Err(e) => {
                    *self.command_tx.lock() = None;
                    if self.shutdown.load(Ordering::Relaxed) {
                        break;
                    }

                    let attempt = self.reconnect_attempt.fetch_add(1, Ordering::Relaxed) + 1;
                    let Some(delay) = self.config.reconnect.retry_delay(attempt, &e) else {
                        if e.is_retryable() {
                            error!("Reconnection attempts exhausted after {} tries", attempt);
                        } else {
                            error!("Streamer session over, not reconnecting: {}", e);
                        }
                        self.emit(ConnectionEvent::ReconnectFailed {
                            error: e.to_string(),
                        });
                        return Err(e);
                    };

                    warn!(
                        "Streamer connection failed, reconnecting in {:?} (attempt {}): {}",
                        delay, attempt, e
                    );
                    self.emit(ConnectionEvent::Reconnecting { attempt, delay });
                    *self.state.write() = ConnectionState::Reconnecting;

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }
        }

        Ok(())
    }

    /// One connection: connect, LOGIN, restore subscriptions, read until closed
    async fn connect_internal(&self, shutdown_rx: &mut watch::Receiver<bool>) -> SchwabResult<()> {
        let info = self.auth.streamer_info().await?;
        let token = self.auth.access_token().await?;
        let url = self
            .config
            .url_override
            .clone()
            .unwrap_or_else(|| info.streamer_socket_url.clone());
        info!("Connecting to streamer at {}", url);

        let (ws_stream, _response) = match timeout(self.config.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((stream, response))) => (stream, response),
            Ok(Err(e)) => {
                return Err(SchwabError::ConnectionFailed {
                    url,
                    source: std::io::Error::other(e.to_string()),
                });
            }
            Err(_) => {
                return Err(SchwabError::ConnectionTimeout {
                    url,
                    timeout: self.config.connect_timeout,
                });
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let login_id = self.subscriptions.write().next_request_id();
        let frame = StreamRequest::login(&info, &token, login_id)
            .to_frame()
            .map_err(|e| SchwabError::InvalidJson {
                message: e.to_string(),
                raw: None,
            })?;
        write
            .send(Message::Text(frame))
            .await
            .map_err(|e| SchwabError::WebSocket(e.to_string()))?;

        let server = match timeout(self.config.login_timeout, self.await_login(&mut read)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SchwabError::ConnectionTimeout {
                    url,
                    timeout: self.config.login_timeout,
                });
            }
        };

        info!("Logged in to streamer ({})", server);
        *self.info.write() = Some(info.clone());
        *self.state.write() = ConnectionState::Connected;
        self.reconnect_attempt.store(0, Ordering::Relaxed);
        self.emit(ConnectionEvent::Connected { server });

        // Open the command channel before restoring so nothing added
        // concurrently falls between the two
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        *self.command_tx.lock() = Some(command_tx);

        let requests = self.subscriptions.write().restoration_requests(&info);
        for request in &requests {
            self.send_request(&mut write, request).await?;
        }
        if !requests.is_empty() {
            self.emit(ConnectionEvent::SubscriptionsRestored {
                count: requests.len(),
            });
        }

        let mut last_activity = Instant::now();
        let mut watchdog = tokio::time::interval(self.config.watchdog_interval());

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if self.handle_message(&text)? {
                            last_activity = Instant::now();
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Streamer closed connection");
                        self.emit(ConnectionEvent::Disconnected {
                            reason: DisconnectReason::ServerClosed,
                        });
                        return Err(SchwabError::WebSocket("Server closed connection".into()));
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        self.emit(ConnectionEvent::Disconnected {
                            reason: DisconnectReason::NetworkError(e.to_string()),
                        });
                        return Err(SchwabError::WebSocket(e.to_string()));
                    }
                    Some(Ok(_)) => {}
                },
                Some(request) = command_rx.recv() => {
                    self.send_request(&mut write, &request).await?;
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown requested, logging out of streamer");
                    let id = self.subscriptions.write().next_request_id();
                    if let Ok(frame) = StreamRequest::logout(&info, id).to_frame() {
                        let _ = write.send(Message::Text(frame)).await;
                    }
                    let _ = write.send(Message::Close(None)).await;
                    self.emit(ConnectionEvent::Disconnected {
                        reason: DisconnectReason::Shutdown,
                    });
                    return Ok(());
                }
                _ = watchdog.tick() => {
                    let elapsed = last_activity.elapsed();
                    if elapsed > self.config.heartbeat_timeout {
                        warn!("No heartbeat received in {:?}, reconnecting", elapsed);
                        self.emit(ConnectionEvent::Disconnected {
                            reason: DisconnectReason::HeartbeatTimeout,
                        });
                        let _ = write.send(Message::Close(None)).await;
                        return Err(SchwabError::HeartbeatTimeout { elapsed });
                    }
                }
            }
        }
    }

    /// Read frames until the LOGIN response arrives; returns its message
    async fn await_login<S>(&self, read: &mut S) -> SchwabResult<String>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    self.messages_received.fetch_add(1, Ordering::Relaxed);
                    match StreamMessage::parse(&text) {
                        Ok(StreamMessage::Response(items)) => {
                            let Some(login) = items.iter().find(|item| item.is_login()) else {
                                self.handle_responses(&items);
                                continue;
                            };
                            if login.is_success() {
                                return Ok(login.content.msg.clone());
                            }
                            warn!(
                                "Streamer login rejected (code {}): {}",
                                login.content.code, login.content.msg
                            );
                            self.emit(ConnectionEvent::Disconnected {
                                reason: DisconnectReason::LoginFailed(login.content.msg.clone()),
                            });
                            return Err(SchwabError::LoginFailed {
                                code: login.content.code,
                                message: login.content.msg.clone(),
                            });
                        }
                        Ok(other) => {
                            self.process(other)?;
                        }
                        Err(e) => warn!("Failed to parse message: {} - {}", e, text),
                    }
                }
                Ok(Message::Close(_)) => {
                    return Err(SchwabError::WebSocket("Connection closed before login".into()));
                }
                Err(e) => return Err(SchwabError::WebSocket(e.to_string())),
                _ => {}
            }
        }

        Err(SchwabError::WebSocket("Connection closed before login".into()))
    }

    async fn send_request<W>(&self, write: &mut W, request: &StreamRequest) -> SchwabResult<()>
    where
        W: futures_util::Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        let json = request.to_frame().map_err(|e| SchwabError::InvalidJson {
            message: e.to_string(),
            raw: None,
        })?;
        debug!("Sending {} {}", request.service, request.command.as_str());
        write
            .send(Message::Text(json))
            .await
            .map_err(|e| SchwabError::WebSocket(e.to_string()))
    }

    /// Handle an incoming text frame
    ///
    /// Returns whether the frame counts as activity for the heartbeat
    /// watchdog. Errors end the current connection.
    fn handle_message(&self, text: &str) -> SchwabResult<bool> {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        match StreamMessage::parse(text) {
            Ok(msg) => self.process(msg),
            Err(e) => {
                warn!("Failed to parse message: {} - {}", e, text);
                Ok(false)
            }
        }
    }

    fn process(&self, msg: StreamMessage) -> SchwabResult<bool> {
        match msg {
            StreamMessage::Response(items) => {
                self.handle_responses(&items);
                Ok(false)
            }
            StreamMessage::Notify(notifications) => {
                let mut active = false;
                for notification in notifications {
                    active |= self.handle_notification(notification)?;
                }
                Ok(active)
            }
            StreamMessage::Data(items) => {
                let now = Utc::now();
                for item in &items {
                    self.handle_data(item, now);
                }
                Ok(true)
            }
            StreamMessage::Unknown(value) => {
                debug!("Unknown message: {}", value);
                Ok(false)
            }
        }
    }

    fn handle_responses(&self, items: &[ResponseItem]) {
        for item in items {
            let request_id = item.requestid.as_deref().and_then(|id| id.parse::<u64>().ok());
            if item.is_success() {
                if let Some(id) = request_id {
                    self.subscriptions.write().confirm(id);
                }
                debug!("{} {} accepted", item.service, item.command);
                self.emit(SubscriptionEvent::Subscribed {
                    service: item.service.clone(),
                    command: item.command.clone(),
                });
            } else {
                if let Some(id) = request_id {
                    self.subscriptions.write().reject(id);
                }
                warn!(
                    "{} {} rejected (code {}): {}",
                    item.service, item.command, item.content.code, item.content.msg
                );
                self.emit(SubscriptionEvent::Rejected {
                    service: item.service.clone(),
                    reason: item.content.msg.clone(),
                });
            }
        }
    }

    fn handle_notification(&self, notification: Notification) -> SchwabResult<bool> {
        match notification {
            Notification::Heartbeat(server_time) => {
                *self.last_heartbeat.write() = Some(Utc::now());
                *self.connection_id.write() = Some(server_time.to_string());
                debug!("Heartbeat {}", server_time);
                self.emit(ConnectionEvent::Heartbeat { server_time });
                Ok(true)
            }
            Notification::Notice { service, content, .. } => {
                if content.is_success() {
                    debug!("Notice from {}: {}", service, content.msg);
                    return Ok(false);
                }
                warn!("Notice from {} (code {}): {}", service, content.code, content.msg);
                if matches!(content.code, CODE_CLOSE_CONNECTION | CODE_STOP_STREAMING) {
                    self.emit(ConnectionEvent::Disconnected {
                        reason: DisconnectReason::ServerNotice {
                            code: content.code,
                            message: content.msg.clone(),
                        },
                    });
                    return Err(SchwabError::SessionEnded {
                        code: content.code,
                        message: content.msg,
                    });
                }
                Ok(false)
            }
        }
    }

    fn handle_data(&self, item: &DataItem, received_at: DateTime<Utc>) {
        for record in StreamData::decode(item, received_at) {
            self.handlers.dispatch(&record);
        }
    }

    /// Emit an event
    fn emit(&self, event: impl Into<Event>) {
        let _ = self.event_tx.send(event.into());
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        *self.state.write() = ConnectionState::ShuttingDown;
        self.shutdown_tx.send_replace(true);
    }
}
