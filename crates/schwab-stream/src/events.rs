//! Connection and subscription events

use schwab_types::Service;
use std::time::Duration;

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the connection
    ServerClosed,
    /// Network error occurred
    NetworkError(String),
    /// Client requested shutdown
    Shutdown,
    /// Streamer rejected the login
    LoginFailed(String),
    /// Streamer sent a notice that ends the session
    ServerNotice { code: i64, message: String },
    /// No heartbeat/message received within timeout period
    HeartbeatTimeout,
}

/// Connection lifecycle events
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Logged in to the streamer
    Connected {
        /// Server description from the login response
        server: String,
    },
    /// Connection was lost
    Disconnected {
        /// Reason for disconnection
        reason: DisconnectReason,
    },
    /// Attempting to reconnect
    Reconnecting {
        /// Current attempt number (1-indexed)
        attempt: u32,
        /// Delay before this attempt
        delay: Duration,
    },
    /// Reconnection attempts exhausted
    ReconnectFailed {
        /// Final error
        error: String,
    },
    /// Subscriptions restored after reconnect
    SubscriptionsRestored {
        /// Number of subscription requests sent
        count: usize,
    },
    /// Heartbeat received
    Heartbeat {
        /// Server time in milliseconds
        server_time: i64,
    },
}

/// Subscription-specific events
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// Subscription command accepted
    Subscribed {
        service: Service,
        command: String,
    },
    /// Subscription command rejected
    Rejected {
        service: Service,
        reason: String,
    },
}

/// All streamer events
#[derive(Debug, Clone)]
pub enum Event {
    /// Connection-related event
    Connection(ConnectionEvent),
    /// Subscription-related event
    Subscription(SubscriptionEvent),
}

impl From<ConnectionEvent> for Event {
    fn from(event: ConnectionEvent) -> Self {
        Event::Connection(event)
    }
}

impl From<SubscriptionEvent> for Event {
    fn from(event: SubscriptionEvent) -> Self {
        Event::Subscription(event)
    }
}
