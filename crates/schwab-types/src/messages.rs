//! Request and response message types for the streamer WebSocket API

use crate::Service;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ============================================================================
// Streamer session info
// ============================================================================

/// Streamer connection details published in the user preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreamerInfo {
    /// WebSocket URL of the streamer
    pub streamer_socket_url: String,
    pub schwab_client_customer_id: String,
    pub schwab_client_correl_id: String,
    pub schwab_client_channel: String,
    pub schwab_client_function_id: String,
}

// ============================================================================
// Request Types
// ============================================================================

/// Streamer command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    Login,
    Logout,
    /// Replace the subscription set of a service
    Subs,
    /// Add keys to the subscription set of a service
    Add,
    /// Remove keys from the subscription set of a service
    Unsubs,
    View,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Subs => "SUBS",
            Self::Add => "ADD",
            Self::Unsubs => "UNSUBS",
            Self::View => "VIEW",
        }
    }
}

/// A single streamer request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRequest {
    pub service: Service,
    pub command: Command,
    /// Request id, echoed in the matching response
    #[serde(serialize_with = "serialize_id")]
    pub requestid: u64,
    #[serde(rename = "SchwabClientCustomerId")]
    pub customer_id: String,
    #[serde(rename = "SchwabClientCorrelId")]
    pub correl_id: String,
    pub parameters: BTreeMap<String, String>,
}

impl StreamRequest {
    fn new(info: &StreamerInfo, service: Service, command: Command, id: u64) -> Self {
        Self {
            service,
            command,
            requestid: id,
            customer_id: info.schwab_client_customer_id.clone(),
            correl_id: info.schwab_client_correl_id.clone(),
            parameters: BTreeMap::new(),
        }
    }

    /// ADMIN LOGIN with a bearer access token
    pub fn login(info: &StreamerInfo, access_token: &str, id: u64) -> Self {
        let mut req = Self::new(info, Service::Admin, Command::Login, id);
        req.parameters
            .insert("Authorization".into(), access_token.to_string());
        req.parameters.insert(
            "SchwabClientChannel".into(),
            info.schwab_client_channel.clone(),
        );
        req.parameters.insert(
            "SchwabClientFunctionId".into(),
            info.schwab_client_function_id.clone(),
        );
        req
    }

    /// ADMIN LOGOUT
    pub fn logout(info: &StreamerInfo, id: u64) -> Self {
        Self::new(info, Service::Admin, Command::Logout, id)
    }

    /// SUBS: replaces the service's subscription set
    pub fn subscribe(
        info: &StreamerInfo,
        service: Service,
        keys: &[String],
        fields: &str,
        id: u64,
    ) -> Self {
        Self::keyed(info, service, Command::Subs, keys, Some(fields), id)
    }

    /// ADD: extends the service's subscription set
    pub fn add(info: &StreamerInfo, service: Service, keys: &[String], fields: &str, id: u64) -> Self {
        Self::keyed(info, service, Command::Add, keys, Some(fields), id)
    }

    /// UNSUBS: removes keys from the service's subscription set
    pub fn unsubscribe(info: &StreamerInfo, service: Service, keys: &[String], id: u64) -> Self {
        Self::keyed(info, service, Command::Unsubs, keys, None, id)
    }

    fn keyed(
        info: &StreamerInfo,
        service: Service,
        command: Command,
        keys: &[String],
        fields: Option<&str>,
        id: u64,
    ) -> Self {
        let mut req = Self::new(info, service, command, id);
        req.parameters.insert("keys".into(), keys.join(","));
        if let Some(fields) = fields {
            req.parameters.insert("fields".into(), fields.to_string());
        }
        req
    }

    /// Serialize as a one-element `{"requests":[...]}` frame
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        StreamRequests {
            requests: vec![self.clone()],
        }
        .to_frame()
    }
}

/// Outbound frame carrying one or more requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRequests {
    pub requests: Vec<StreamRequest>,
}

impl StreamRequests {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn serialize_id<S: serde::Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&id.to_string())
}

/// Accepts `"123"` or `123`
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ============================================================================
// Response Types
// ============================================================================

/// Result code and message of a response or notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponseContent {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

impl ResponseContent {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Reply to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseItem {
    pub service: Service,
    pub command: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub requestid: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub content: ResponseContent,
}

impl ResponseItem {
    /// Whether this replies to a LOGIN
    pub fn is_login(&self) -> bool {
        self.service == Service::Admin && self.command.eq_ignore_ascii_case("LOGIN")
    }

    pub fn is_success(&self) -> bool {
        self.content.is_success()
    }
}

/// Unsolicited message from the streamer
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Keepalive carrying the server time in milliseconds
    Heartbeat(i64),
    /// Service notice, e.g. a forced disconnect
    Notice {
        service: Service,
        timestamp: Option<i64>,
        content: ResponseContent,
    },
}

#[derive(Deserialize)]
struct RawNotification {
    #[serde(default, deserialize_with = "string_or_number")]
    heartbeat: Option<String>,
    #[serde(default)]
    service: Option<Service>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    content: ResponseContent,
}

impl<'de> Deserialize<'de> for Notification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawNotification::deserialize(deserializer)?;
        if let Some(hb) = raw.heartbeat {
            let millis = hb.parse::<i64>().map_err(serde::de::Error::custom)?;
            return Ok(Self::Heartbeat(millis));
        }
        Ok(Self::Notice {
            service: raw.service.unwrap_or(Service::Unknown(String::new())),
            timestamp: raw.timestamp,
            content: raw.content,
        })
    }
}

/// Field updates for one service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataItem {
    pub service: Service,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub command: Option<String>,
    /// One object per key, with numeric field indexes as names
    #[serde(default)]
    pub content: Vec<Map<String, Value>>,
}

/// Any inbound streamer frame
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Response(Vec<ResponseItem>),
    Notify(Vec<Notification>),
    Data(Vec<DataItem>),
    Unknown(Value),
}

impl StreamMessage {
    /// Parse a raw text frame
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let mut value: Value = serde_json::from_str(json)?;

        if let Some(items) = value.get_mut("response").map(Value::take) {
            return Ok(Self::Response(serde_json::from_value(items)?));
        }
        if let Some(items) = value.get_mut("notify").map(Value::take) {
            return Ok(Self::Notify(serde_json::from_value(items)?));
        }
        if let Some(items) = value.get_mut("data").map(Value::take) {
            return Ok(Self::Data(serde_json::from_value(items)?));
        }
        Ok(Self::Unknown(value))
    }

    /// Heartbeat time if this frame is a heartbeat notification
    pub fn heartbeat(&self) -> Option<i64> {
        match self {
            Self::Notify(items) => items.iter().find_map(|n| match n {
                Notification::Heartbeat(ms) => Some(*ms),
                _ => None,
            }),
            _ => None,
        }
    }
}
