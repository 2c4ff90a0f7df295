//! Buffers fed by streamed records
//!
//! Quote updates append price and volume points per symbol, keeping only
//! the most recent [`MAX_POINTS`]. Option updates are merged into a
//! snapshot per underlying, keyed by option symbol. The buffers back the
//! real-time charts and option table.

use crate::figures::{bar_trace, line_trace, Figure};
use crate::tables::{greek, money, OPTION_COLUMNS};
use chrono::{DateTime, Local, Utc};
use dashmap::DashMap;
use schwab_data::Table;
use schwab_stream::{OptionUpdate, QuoteUpdate, StreamData};
use schwab_types::ContractType;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Points kept per symbol
pub const MAX_POINTS: usize = 1000;

/// One quote turned into a chart point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumePoint {
    pub datetime: DateTime<Utc>,
    pub volume: u64,
}

/// Latest known state of one option contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionRow {
    pub symbol: String,
    pub strike: Option<f64>,
    pub expiration: Option<String>,
    /// `CALL` or `PUT`
    pub option_type: Option<String>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
    pub volume: Option<u64>,
    pub open_interest: Option<u64>,
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
    pub updated: DateTime<Utc>,
}

impl OptionRow {
    fn new(update: &OptionUpdate) -> Self {
        Self {
            symbol: update.symbol.clone(),
            strike: None,
            expiration: None,
            option_type: None,
            bid: None,
            ask: None,
            last: None,
            volume: None,
            open_interest: None,
            delta: None,
            gamma: None,
            theta: None,
            vega: None,
            updated: update.received_at,
        }
    }

    /// Overwrite the fields present in the update
    fn apply(&mut self, update: &OptionUpdate) {
        fn merge<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }

        merge(&mut self.strike, &update.strike);
        merge(&mut self.expiration, &update.expiration());
        merge(&mut self.option_type, &update.contract_type);
        merge(&mut self.bid, &update.bid);
        merge(&mut self.ask, &update.ask);
        merge(&mut self.last, &update.last);
        merge(&mut self.volume, &update.total_volume);
        merge(&mut self.open_interest, &update.open_interest);
        merge(&mut self.delta, &update.delta);
        merge(&mut self.gamma, &update.gamma);
        merge(&mut self.theta, &update.theta);
        merge(&mut self.vega, &update.vega);
        self.updated = update.received_at;
    }

    fn is_call(&self) -> bool {
        self.option_type.as_deref() == Some("CALL")
    }

    fn is_put(&self) -> bool {
        self.option_type.as_deref() == Some("PUT")
    }

    fn passes(&self, filter: ContractType) -> bool {
        match filter {
            ContractType::Call => self.is_call(),
            ContractType::Put => self.is_put(),
            ContractType::All => true,
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.strike.map(|s| format!("{:.2}", s)).unwrap_or_default(),
            self.expiration.clone().unwrap_or_default(),
            self.option_type.clone().unwrap_or_default(),
            self.symbol.clone(),
            money(self.bid.unwrap_or(0.0)),
            money(self.ask.unwrap_or(0.0)),
            money(self.last.unwrap_or(0.0)),
            self.volume.unwrap_or(0).to_string(),
            self.open_interest.unwrap_or(0).to_string(),
            greek(self.delta),
            greek(self.gamma),
            greek(self.theta),
            greek(self.vega),
            self.updated.with_timezone(&Local).format("%H:%M:%S").to_string(),
        ]
    }
}

/// Streamed data kept for the real-time views
#[derive(Debug)]
pub struct RealtimeBuffers {
    prices: DashMap<String, VecDeque<PricePoint>>,
    volumes: DashMap<String, VecDeque<VolumePoint>>,
    options: DashMap<String, BTreeMap<String, OptionRow>>,
    max_points: usize,
}

impl Default for RealtimeBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeBuffers {
    pub fn new() -> Self {
        Self::with_max_points(MAX_POINTS)
    }

    /// Buffers keeping at most `max_points` per symbol
    pub fn with_max_points(max_points: usize) -> Self {
        Self {
            prices: DashMap::new(),
            volumes: DashMap::new(),
            options: DashMap::new(),
            max_points: max_points.max(1),
        }
    }

    /// Route a record to the matching handler
    pub fn handle_update(&self, data: &StreamData) {
        match data {
            StreamData::Quote(quote) => self.handle_quote_update(quote),
            StreamData::Option(option) => self.handle_option_update(option),
        }
    }

    /// Append price and volume points for a quote
    ///
    /// Updates without a price add no price point. Updates without a
    /// volume add no volume point; their price point repeats the last known
    /// volume.
    pub fn handle_quote_update(&self, quote: &QuoteUpdate) {
        let symbol = quote.symbol.as_str();

        if let Some(price) = quote.price() {
            let mut points = self.prices.entry(symbol.to_string()).or_default();
            let volume = quote
                .total_volume
                .or_else(|| points.back().map(|p| p.volume))
                .unwrap_or(0);
            push_capped(
                &mut points,
                PricePoint {
                    datetime: quote.received_at,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume,
                },
                self.max_points,
            );
        }

        if let Some(volume) = quote.total_volume {
            let mut points = self.volumes.entry(symbol.to_string()).or_default();
            push_capped(
                &mut points,
                VolumePoint {
                    datetime: quote.received_at,
                    volume,
                },
                self.max_points,
            );
        }
        debug!("Buffered quote update for {}", symbol);
    }

    /// Merge an option update into its underlying's snapshot
    pub fn handle_option_update(&self, option: &OptionUpdate) {
        let underlying = option.underlying_or_root().to_uppercase();
        let mut rows = self.options.entry(underlying).or_default();
        rows.entry(option.symbol.clone())
            .or_insert_with(|| OptionRow::new(option))
            .apply(option);
        debug!("Buffered option update for {}", option.symbol);
    }

    /// Symbols with buffered price points, sorted
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.prices.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn price_points(&self, symbol: &str) -> Vec<PricePoint> {
        self.prices
            .get(symbol)
            .map(|points| points.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn volume_points(&self, symbol: &str) -> Vec<VolumePoint> {
        self.volumes
            .get(symbol)
            .map(|points| points.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any option rows are buffered for the underlying
    pub fn has_options(&self, underlying: &str) -> bool {
        self.options
            .get(&underlying.to_uppercase())
            .is_some_and(|rows| !rows.is_empty())
    }

    /// Line chart of streamed prices
    ///
    /// With no symbols, every buffered symbol is drawn.
    pub fn price_figure<S: AsRef<str>>(&self, symbols: &[S]) -> Figure {
        let figure = Figure::empty("Real-time Price Chart", "Time", "Price ($)");
        let symbols = self.chart_symbols(symbols, |s| self.prices.contains_key(s));
        if symbols.is_empty() {
            return figure;
        }

        let data = symbols
            .iter()
            .filter_map(|symbol| {
                let points = self.prices.get(symbol)?;
                if points.is_empty() {
                    return None;
                }
                Some(line_trace(
                    symbol,
                    points.iter().map(|p| p.datetime.to_rfc3339()).collect(),
                    points.iter().map(|p| p.close).collect(),
                ))
            })
            .collect();
        Figure { data, ..figure }.with_layout("hovermode", "closest")
    }

    /// Bar chart of streamed volumes
    pub fn volume_figure<S: AsRef<str>>(&self, symbols: &[S]) -> Figure {
        let figure = Figure::empty("Real-time Volume Chart", "Time", "Volume");
        let symbols = self.chart_symbols(symbols, |s| self.volumes.contains_key(s));
        if symbols.is_empty() {
            return figure;
        }

        let data = symbols
            .iter()
            .filter_map(|symbol| {
                let points = self.volumes.get(symbol)?;
                if points.is_empty() {
                    return None;
                }
                Some(bar_trace(
                    symbol,
                    points.iter().map(|p| p.datetime.to_rfc3339()).collect(),
                    points.iter().map(|p| p.volume).collect(),
                ))
            })
            .collect();
        Figure { data, ..figure }.with_layout("barmode", "group")
    }

    /// Buffered option rows of an underlying, sorted by option symbol
    pub fn option_table(&self, underlying: &str, filter: ContractType) -> Table {
        let mut table = Table::new(OPTION_COLUMNS.iter().copied().chain(["Updated"]));
        if let Some(rows) = self.options.get(&underlying.to_uppercase()) {
            for row in rows.values().filter(|row| row.passes(filter)) {
                table.push_row(row.cells());
            }
        }
        table
    }

    /// Drop everything buffered
    pub fn clear(&self) {
        self.prices.clear();
        self.volumes.clear();
        self.options.clear();
    }

    fn chart_symbols<S: AsRef<str>>(&self, requested: &[S], buffered: impl Fn(&str) -> bool) -> Vec<String> {
        if requested.is_empty() {
            return self.symbols();
        }
        requested
            .iter()
            .map(|s| s.as_ref().to_uppercase())
            .filter(|s| buffered(s))
            .collect()
    }
}

fn push_capped<T>(points: &mut VecDeque<T>, point: T, max: usize) {
    points.push_back(point);
    while points.len() > max {
        points.pop_front();
    }
}
