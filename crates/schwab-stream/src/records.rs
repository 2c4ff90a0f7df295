//! Decoded streamer records
//!
//! The streamer sends level one data as objects keyed by numeric field
//! indexes, and only the fields that changed since the last message. Every
//! numeric field is therefore optional.

use chrono::{DateTime, Utc};
use schwab_types::{DataItem, DataType, Service};
use serde::Serialize;
use serde_json::{Map, Value};

/// Field indexes requested for LEVELONE_EQUITIES
pub const QUOTE_FIELDS: &str = "0,1,2,3,4,5,8,9,10,11,12,17,18";

/// Field indexes requested for LEVELONE_OPTIONS
pub const OPTION_FIELDS: &str =
    "0,1,2,3,4,5,6,7,8,9,10,12,15,19,20,21,22,23,26,27,28,29,30,31,32";

/// Comma-separated field list for a data type
pub fn fields_for(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Quote => QUOTE_FIELDS,
        DataType::Option => OPTION_FIELDS,
    }
}

mod equity_field {
    pub const BID: &str = "1";
    pub const ASK: &str = "2";
    pub const LAST: &str = "3";
    pub const BID_SIZE: &str = "4";
    pub const ASK_SIZE: &str = "5";
    pub const TOTAL_VOLUME: &str = "8";
    pub const LAST_SIZE: &str = "9";
    pub const HIGH: &str = "10";
    pub const LOW: &str = "11";
    pub const CLOSE: &str = "12";
    pub const OPEN: &str = "17";
    pub const NET_CHANGE: &str = "18";
}

mod option_field {
    pub const DESCRIPTION: &str = "1";
    pub const BID: &str = "2";
    pub const ASK: &str = "3";
    pub const LAST: &str = "4";
    pub const HIGH: &str = "5";
    pub const LOW: &str = "6";
    pub const CLOSE: &str = "7";
    pub const TOTAL_VOLUME: &str = "8";
    pub const OPEN_INTEREST: &str = "9";
    pub const VOLATILITY: &str = "10";
    pub const EXP_YEAR: &str = "12";
    pub const OPEN: &str = "15";
    pub const NET_CHANGE: &str = "19";
    pub const STRIKE: &str = "20";
    pub const CONTRACT_TYPE: &str = "21";
    pub const UNDERLYING: &str = "22";
    pub const EXP_MONTH: &str = "23";
    pub const EXP_DAY: &str = "26";
    pub const DAYS_TO_EXPIRATION: &str = "27";
    pub const DELTA: &str = "28";
    pub const GAMMA: &str = "29";
    pub const THETA: &str = "30";
    pub const VEGA: &str = "31";
    pub const RHO: &str = "32";
}

fn symbol_of(content: &Map<String, Value>) -> Option<String> {
    content
        .get("key")
        .or_else(|| content.get("0"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn f64_field(content: &Map<String, Value>, field: &str) -> Option<f64> {
    match content.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn u64_field(content: &Map<String, Value>, field: &str) -> Option<u64> {
    match content.get(field)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn str_field(content: &Map<String, Value>, field: &str) -> Option<String> {
    match content.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Level one equity update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteUpdate {
    pub symbol: String,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
    pub bid_size: Option<u64>,
    pub ask_size: Option<u64>,
    pub last_size: Option<u64>,
    pub total_volume: Option<u64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub open: Option<f64>,
    pub net_change: Option<f64>,
    pub received_at: DateTime<Utc>,
}

impl QuoteUpdate {
    /// Decode one content object; `None` without a symbol
    pub fn from_content(content: &Map<String, Value>, received_at: DateTime<Utc>) -> Option<Self> {
        use equity_field::*;
        Some(Self {
            symbol: symbol_of(content)?,
            bid: f64_field(content, BID),
            ask: f64_field(content, ASK),
            last: f64_field(content, LAST),
            bid_size: u64_field(content, BID_SIZE),
            ask_size: u64_field(content, ASK_SIZE),
            last_size: u64_field(content, LAST_SIZE),
            total_volume: u64_field(content, TOTAL_VOLUME),
            high: f64_field(content, HIGH),
            low: f64_field(content, LOW),
            close: f64_field(content, CLOSE),
            open: f64_field(content, OPEN),
            net_change: f64_field(content, NET_CHANGE),
            received_at,
        })
    }

    /// Last trade price, falling back to the bid/ask midpoint
    pub fn price(&self) -> Option<f64> {
        self.last.or(match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        })
    }
}

/// Level one option update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionUpdate {
    pub symbol: String,
    pub description: Option<String>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub open: Option<f64>,
    pub net_change: Option<f64>,
    pub total_volume: Option<u64>,
    pub open_interest: Option<u64>,
    pub volatility: Option<f64>,
    pub strike: Option<f64>,
    /// `CALL` or `PUT`
    pub contract_type: Option<String>,
    pub underlying: Option<String>,
    pub expiration_year: Option<u32>,
    pub expiration_month: Option<u32>,
    pub expiration_day: Option<u32>,
    pub days_to_expiration: Option<i64>,
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
    pub rho: Option<f64>,
    pub received_at: DateTime<Utc>,
}

impl OptionUpdate {
    /// Decode one content object; `None` without a symbol
    pub fn from_content(content: &Map<String, Value>, received_at: DateTime<Utc>) -> Option<Self> {
        use option_field::*;
        let contract_type = str_field(content, CONTRACT_TYPE).map(|t| {
            match t.trim().to_ascii_uppercase().as_str() {
                "C" | "CALL" => "CALL".to_string(),
                "P" | "PUT" => "PUT".to_string(),
                other => other.to_string(),
            }
        });

        Some(Self {
            symbol: symbol_of(content)?,
            description: str_field(content, DESCRIPTION),
            bid: f64_field(content, BID),
            ask: f64_field(content, ASK),
            last: f64_field(content, LAST),
            high: f64_field(content, HIGH),
            low: f64_field(content, LOW),
            close: f64_field(content, CLOSE),
            open: f64_field(content, OPEN),
            net_change: f64_field(content, NET_CHANGE),
            total_volume: u64_field(content, TOTAL_VOLUME),
            open_interest: u64_field(content, OPEN_INTEREST),
            volatility: f64_field(content, VOLATILITY),
            strike: f64_field(content, STRIKE),
            contract_type,
            underlying: str_field(content, UNDERLYING).filter(|s| !s.trim().is_empty()),
            expiration_year: u64_field(content, EXP_YEAR).map(|v| v as u32),
            expiration_month: u64_field(content, EXP_MONTH).map(|v| v as u32),
            expiration_day: u64_field(content, EXP_DAY).map(|v| v as u32),
            days_to_expiration: f64_field(content, DAYS_TO_EXPIRATION).map(|v| v as i64),
            delta: f64_field(content, DELTA),
            gamma: f64_field(content, GAMMA),
            theta: f64_field(content, THETA),
            vega: f64_field(content, VEGA),
            rho: f64_field(content, RHO),
            received_at,
        })
    }

    /// Expiration as `YYYY-MM-DD` when year, month and day are known
    pub fn expiration(&self) -> Option<String> {
        match (self.expiration_year, self.expiration_month, self.expiration_day) {
            (Some(y), Some(m), Some(d)) => Some(format!("{:04}-{:02}-{:02}", y, m, d)),
            _ => None,
        }
    }

    /// Underlying symbol, or the root of the option symbol
    ///
    /// `"AAPL  240119C00150000"` has root `"AAPL"`.
    pub fn underlying_or_root(&self) -> String {
        if let Some(underlying) = &self.underlying {
            return underlying.trim().to_string();
        }
        self.symbol
            .chars()
            .take_while(|c| !c.is_whitespace() && !c.is_ascii_digit())
            .collect()
    }

    /// Whether this is a call
    pub fn is_call(&self) -> bool {
        self.contract_type.as_deref() == Some("CALL")
    }
}

/// A decoded record ready for handler dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum StreamData {
    Quote(QuoteUpdate),
    Option(OptionUpdate),
}

impl StreamData {
    /// Handler key for this record
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Quote(_) => DataType::Quote,
            Self::Option(_) => DataType::Option,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Quote(q) => &q.symbol,
            Self::Option(o) => &o.symbol,
        }
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        match self {
            Self::Quote(q) => q.received_at,
            Self::Option(o) => o.received_at,
        }
    }

    /// Decode every record in a data item; unknown services decode to nothing
    pub fn decode(item: &DataItem, received_at: DateTime<Utc>) -> Vec<StreamData> {
        match item.service {
            Service::LevelOneEquities => item
                .content
                .iter()
                .filter_map(|c| QuoteUpdate::from_content(c, received_at))
                .map(StreamData::Quote)
                .collect(),
            Service::LevelOneOptions => item
                .content
                .iter()
                .filter_map(|c| OptionUpdate::from_content(c, received_at))
                .map(StreamData::Option)
                .collect(),
            _ => Vec::new(),
        }
    }
}
