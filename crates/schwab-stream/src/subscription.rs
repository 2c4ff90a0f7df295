//! Subscription management

use crate::records::fields_for;
use schwab_types::{Command, DataType, Service, StreamRequest, StreamerInfo};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Symbols of one data type to subscribe to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub data_type: DataType,
    pub symbols: Vec<String>,
}

impl Subscription {
    pub fn new(data_type: DataType, symbols: Vec<String>) -> Self {
        Self { data_type, symbols }
    }

    /// Streamer service for this subscription
    pub fn service(&self) -> Service {
        self.data_type.service()
    }

    /// Comma-separated field indexes
    pub fn fields(&self) -> &'static str {
        fields_for(self.data_type)
    }

    /// Convert to a streamer request
    pub fn to_request(&self, info: &StreamerInfo, command: Command, request_id: u64) -> StreamRequest {
        match command {
            Command::Subs => {
                StreamRequest::subscribe(info, self.service(), &self.symbols, self.fields(), request_id)
            }
            Command::Unsubs => StreamRequest::unsubscribe(info, self.service(), &self.symbols, request_id),
            _ => StreamRequest::add(info, self.service(), &self.symbols, self.fields(), request_id),
        }
    }
}

/// Parse caller field names (`QUOTE`, `OPTION`) into data types
///
/// An empty list means `QUOTE`. Unknown names are logged and skipped.
pub fn parse_fields<S: AsRef<str>>(fields: &[S]) -> Vec<DataType> {
    if fields.is_empty() {
        return vec![DataType::Quote];
    }
    let mut out = Vec::new();
    for field in fields {
        match field.as_ref().parse::<DataType>() {
            Ok(data_type) if !out.contains(&data_type) => out.push(data_type),
            Ok(_) => {}
            Err(e) => warn!("Skipping subscription field: {}", e),
        }
    }
    out
}

/// Key under which a symbol/field pair is tracked
pub fn subscription_key(symbol: &str, data_type: DataType) -> String {
    format!("{}_{}", symbol, data_type)
}

/// Tracks active subscriptions for dedup and reconnect restoration
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Active `SYMBOL_FIELD` keys
    active: HashSet<String>,
    /// Symbols per data type in subscription order
    symbols: HashMap<DataType, Vec<String>>,
    /// Request ids awaiting a response, with their service
    pending: HashMap<u64, Service>,
    /// Next request ID
    next_request_id: u64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a request id
    pub fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Add symbols for a data type
    ///
    /// Returns the subscription for the symbols that were not already
    /// active, or `None` when every pair was already subscribed.
    pub fn add<S: AsRef<str>>(&mut self, symbols: &[S], data_type: DataType) -> Option<Subscription> {
        let mut added = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            if self.active.insert(subscription_key(&symbol, data_type)) {
                info!("Added subscription for {} {}", symbol, data_type);
                self.symbols.entry(data_type).or_default().push(symbol.clone());
                added.push(symbol);
            }
        }
        (!added.is_empty()).then(|| Subscription::new(data_type, added))
    }

    /// Remove symbols for a data type; returns the ones that were active
    pub fn remove<S: AsRef<str>>(&mut self, symbols: &[S], data_type: DataType) -> Option<Subscription> {
        let mut removed = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if self.active.remove(&subscription_key(&symbol, data_type)) {
                if let Some(list) = self.symbols.get_mut(&data_type) {
                    list.retain(|s| *s != symbol);
                }
                removed.push(symbol);
            }
        }
        (!removed.is_empty()).then(|| Subscription::new(data_type, removed))
    }

    /// Build a request for a subscription and track it as pending
    pub fn request(&mut self, sub: &Subscription, info: &StreamerInfo, command: Command) -> StreamRequest {
        let id = self.next_request_id();
        self.pending.insert(id, sub.service());
        sub.to_request(info, command, id)
    }

    /// Mark a request as accepted
    pub fn confirm(&mut self, request_id: u64) -> Option<Service> {
        self.pending.remove(&request_id)
    }

    /// Mark a request as rejected
    ///
    /// The symbols stay tracked so the next reconnect retries them.
    pub fn reject(&mut self, request_id: u64) -> Option<Service> {
        self.pending.remove(&request_id)
    }

    pub fn is_active(&self, symbol: &str, data_type: DataType) -> bool {
        self.active
            .contains(&subscription_key(&symbol.trim().to_uppercase(), data_type))
    }

    /// Number of active symbol/field pairs
    pub fn count(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.active.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// One subscription per data type covering every active symbol
    pub fn all(&self) -> Vec<Subscription> {
        [DataType::Quote, DataType::Option]
            .into_iter()
            .filter_map(|dt| {
                let symbols = self.symbols.get(&dt).filter(|s| !s.is_empty())?;
                Some(Subscription::new(dt, symbols.clone()))
            })
            .collect()
    }

    /// Clear all subscriptions
    pub fn clear(&mut self) {
        self.active.clear();
        self.symbols.clear();
        self.pending.clear();
    }

    /// SUBS requests re-establishing every active subscription
    pub fn restoration_requests(&mut self, info: &StreamerInfo) -> Vec<StreamRequest> {
        self.pending.clear();
        self.all()
            .iter()
            .map(|sub| self.request(sub, info, Command::Subs))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> StreamerInfo {
        StreamerInfo {
            streamer_socket_url: "ws://localhost".into(),
            schwab_client_customer_id: "c".into(),
            schwab_client_correl_id: "r".into(),
            schwab_client_channel: "N9".into(),
            schwab_client_function_id: "APIAPP".into(),
        }
    }

    #[test]
    fn test_parse_fields() {
        assert_eq!(parse_fields::<&str>(&[]), vec![DataType::Quote]);
        assert_eq!(
            parse_fields(&["OPTION", "quote", "BOOK", "OPTION"]),
            vec![DataType::Option, DataType::Quote]
        );
        assert!(parse_fields(&["BOOK"]).is_empty());
    }

    #[test]
    fn test_add_dedups_pairs() {
        let mut manager = SubscriptionManager::new();
        let sub = manager.add(&["aapl", "MSFT"], DataType::Quote).unwrap();
        assert_eq!(sub.symbols, vec!["AAPL", "MSFT"]);

        let sub = manager.add(&["AAPL", "TSLA"], DataType::Quote).unwrap();
        assert_eq!(sub.symbols, vec!["TSLA"]);

        assert!(manager.add(&["MSFT"], DataType::Quote).is_none());
        // Same symbol under another field is a new pair
        assert!(manager.add(&["MSFT"], DataType::Option).is_some());

        assert_eq!(manager.count(), 4);
        assert_eq!(
            manager.keys(),
            vec!["AAPL_QUOTE", "MSFT_OPTION", "MSFT_QUOTE", "TSLA_QUOTE"]
        );
    }

    #[test]
    fn test_request_ids_increase_and_pending() {
        let mut manager = SubscriptionManager::new();
        let sub = manager.add(&["AAPL"], DataType::Quote).unwrap();
        let first = manager.request(&sub, &info(), Command::Add);
        let second = manager.request(&sub, &info(), Command::Add);
        assert!(second.requestid > first.requestid);

        assert_eq!(manager.confirm(first.requestid), Some(Service::LevelOneEquities));
        assert_eq!(manager.confirm(first.requestid), None);
        assert_eq!(manager.reject(second.requestid), Some(Service::LevelOneEquities));
        assert!(manager.is_active("AAPL", DataType::Quote));
    }

    #[test]
    fn test_restoration_requests() {
        let mut manager = SubscriptionManager::new();
        manager.add(&["AAPL", "MSFT"], DataType::Quote);
        manager.add(&["AAPL"], DataType::Option);

        let requests = manager.restoration_requests(&info());
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].command, Command::Subs);
        assert_eq!(requests[0].service, Service::LevelOneEquities);
        assert_eq!(requests[0].parameters["keys"], "AAPL,MSFT");
        assert_eq!(requests[1].service, Service::LevelOneOptions);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut manager = SubscriptionManager::new();
        manager.add(&["AAPL", "MSFT"], DataType::Quote);
        let removed = manager.remove(&["MSFT", "GOOGL"], DataType::Quote).unwrap();
        assert_eq!(removed.symbols, vec!["MSFT"]);
        assert_eq!(manager.all()[0].symbols, vec!["AAPL"]);

        let request = manager.request(&removed, &info(), Command::Unsubs);
        assert_eq!(request.command, Command::Unsubs);
        assert_eq!(request.parameters["keys"], "MSFT");

        manager.clear();
        assert!(manager.is_empty());
        assert!(manager.all().is_empty());
        assert!(manager.restoration_requests(&info()).is_empty());
    }
}
