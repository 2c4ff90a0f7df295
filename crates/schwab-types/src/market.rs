//! Market data models returned by the REST API

use crate::ContractType;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Price history
// ============================================================================

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time in milliseconds since the Unix epoch
    pub datetime: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

impl Candle {
    /// Bar open time as a UTC timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.datetime)
            .single()
            .unwrap_or_default()
    }
}

/// Price history for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    #[serde(default)]
    pub symbol: String,
    /// True when the API had no bars for the request
    #[serde(default)]
    pub empty: bool,
    #[serde(default)]
    pub candles: Vec<Candle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
}

impl PriceHistory {
    /// Whether there are no bars
    pub fn is_empty(&self) -> bool {
        self.empty || self.candles.is_empty()
    }

    /// Most recent bar
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }
}

// ============================================================================
// Quotes
// ============================================================================

/// Snapshot quote fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(default)]
    pub bid_price: Option<f64>,
    #[serde(default)]
    pub ask_price: Option<f64>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub open_price: Option<f64>,
    #[serde(default)]
    pub high_price: Option<f64>,
    #[serde(default)]
    pub low_price: Option<f64>,
    #[serde(default)]
    pub close_price: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<u64>,
    #[serde(default)]
    pub net_change: Option<f64>,
    #[serde(default)]
    pub net_percent_change: Option<f64>,
    #[serde(default)]
    pub bid_size: Option<u64>,
    #[serde(default)]
    pub ask_size: Option<u64>,
    /// Quote time in milliseconds since the Unix epoch
    #[serde(default)]
    pub quote_time: Option<i64>,
}

/// Quote for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteEntry {
    pub symbol: String,
    #[serde(default)]
    pub asset_main_type: Option<String>,
    #[serde(default)]
    pub quote: Quote,
}

/// Symbols the quotes endpoint could not resolve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuoteErrors {
    #[serde(default)]
    pub invalid_symbols: Vec<String>,
}

/// Response of the quotes endpoint, keyed by symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuoteResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<QuoteErrors>,
    #[serde(flatten)]
    pub quotes: BTreeMap<String, QuoteEntry>,
}

impl QuoteResponse {
    /// Quote for a symbol, if returned
    pub fn get(&self, symbol: &str) -> Option<&QuoteEntry> {
        self.quotes.get(symbol)
    }

    /// Symbols reported invalid by the API
    pub fn invalid_symbols(&self) -> &[String] {
        self.errors
            .as_ref()
            .map(|e| e.invalid_symbols.as_slice())
            .unwrap_or(&[])
    }
}

// ============================================================================
// Option chains
// ============================================================================

/// A single option contract in a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    /// `CALL` or `PUT`
    pub put_call: String,
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub last: f64,
    #[serde(default)]
    pub total_volume: u64,
    #[serde(default)]
    pub open_interest: u64,
    #[serde(default)]
    pub volatility: Option<f64>,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub theta: Option<f64>,
    #[serde(default)]
    pub vega: Option<f64>,
    #[serde(default)]
    pub rho: Option<f64>,
    #[serde(default)]
    pub strike_price: f64,
    /// ISO-8601 expiration timestamp
    #[serde(default)]
    pub expiration_date: String,
    #[serde(default)]
    pub days_to_expiration: i64,
    #[serde(default)]
    pub in_the_money: bool,
}

impl OptionContract {
    /// Whether this is a call
    pub fn is_call(&self) -> bool {
        self.put_call.eq_ignore_ascii_case("CALL")
    }

    /// Expiration as `YYYY-MM-DD`
    pub fn expiration_day(&self) -> &str {
        self.expiration_date
            .get(..10)
            .unwrap_or(&self.expiration_date)
    }
}

/// Contracts for one expiration, keyed by strike (`"150.0"`)
pub type StrikeMap = BTreeMap<String, Vec<OptionContract>>;

/// Expirations keyed by `"YYYY-MM-DD:<days to expiration>"`
pub type ExpDateMap = BTreeMap<String, StrikeMap>;

/// Option chain for one underlying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OptionChain {
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub underlying_price: Option<f64>,
    #[serde(default)]
    pub call_exp_date_map: ExpDateMap,
    #[serde(default)]
    pub put_exp_date_map: ExpDateMap,
}

impl OptionChain {
    /// Whether the chain carries no contracts
    pub fn is_empty(&self) -> bool {
        self.call_exp_date_map.is_empty() && self.put_exp_date_map.is_empty()
    }

    /// Flattened contracts in (expiration, strike) order, calls before puts
    pub fn contracts(&self, filter: ContractType) -> Vec<&OptionContract> {
        let mut out = Vec::new();
        if filter.includes_calls() {
            flatten_into(&self.call_exp_date_map, &mut out);
        }
        if filter.includes_puts() {
            flatten_into(&self.put_exp_date_map, &mut out);
        }
        out
    }

    /// Expiration dates (`YYYY-MM-DD`) present in the call map
    pub fn expiration_dates(&self) -> Vec<String> {
        self.call_exp_date_map
            .keys()
            .map(|key| expiration_from_key(key).to_string())
            .collect()
    }
}

/// Date part of an expiration map key (`"2024-01-19:5"` → `"2024-01-19"`)
pub fn expiration_from_key(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}

fn flatten_into<'a>(map: &'a ExpDateMap, out: &mut Vec<&'a OptionContract>) {
    for strikes in map.values() {
        // Strike keys are decimal strings; order them numerically
        let mut ordered: Vec<(f64, &Vec<OptionContract>)> = strikes
            .iter()
            .map(|(k, v)| (k.parse::<f64>().unwrap_or(f64::MAX), v))
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, contracts) in ordered {
            out.extend(contracts.iter());
        }
    }
}
