//! Chart payloads
//!
//! A [`Figure`] is the JSON a plotting front end renders: a list of traces
//! and a layout. Traces follow plotly's schema (`scatter`, `bar`,
//! `candlestick`).

use schwab_types::PriceHistory;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Traces plus layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

impl Figure {
    /// Figure with no traces
    pub fn empty(title: &str, x_title: &str, y_title: &str) -> Self {
        Self {
            data: Vec::new(),
            layout: json!({
                "title": title,
                "xaxis": {"title": x_title},
                "yaxis": {"title": y_title},
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Set an extra layout key such as `hovermode` or `barmode`
    pub fn with_layout(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(layout) = &mut self.layout {
            layout.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.layout.get("title").and_then(Value::as_str)
    }
}

pub(crate) fn line_trace(name: &str, x: Vec<String>, y: Vec<f64>) -> Value {
    json!({"type": "scatter", "mode": "lines", "name": name, "x": x, "y": y})
}

pub(crate) fn bar_trace(name: &str, x: Vec<String>, y: Vec<u64>) -> Value {
    json!({"type": "bar", "name": name, "x": x, "y": y})
}

fn candle_times(history: &PriceHistory) -> Vec<String> {
    history
        .candles
        .iter()
        .map(|c| c.timestamp().to_rfc3339())
        .collect()
}

/// OHLC candlestick chart of one history
pub fn candlestick_chart(history: &PriceHistory, title: &str) -> Figure {
    let figure = Figure::empty(title, "Date", "Price ($)");
    if history.is_empty() {
        return figure;
    }

    let candles = &history.candles;
    Figure {
        data: vec![json!({
            "type": "candlestick",
            "name": "OHLC",
            "x": candle_times(history),
            "open": candles.iter().map(|c| c.open).collect::<Vec<_>>(),
            "high": candles.iter().map(|c| c.high).collect::<Vec<_>>(),
            "low": candles.iter().map(|c| c.low).collect::<Vec<_>>(),
            "close": candles.iter().map(|c| c.close).collect::<Vec<_>>(),
        })],
        ..figure
    }
    .with_layout("hovermode", "closest")
}

/// Closing prices of several symbols, one line each
pub fn history_price_figure(histories: &BTreeMap<String, PriceHistory>) -> Figure {
    let figure = Figure::empty("Price Chart", "Date", "Price ($)");
    if histories.is_empty() {
        return figure;
    }

    let data = histories
        .iter()
        .filter(|(_, history)| !history.is_empty())
        .map(|(symbol, history)| {
            line_trace(
                symbol,
                candle_times(history),
                history.candles.iter().map(|c| c.close).collect(),
            )
        })
        .collect();
    Figure { data, ..figure }.with_layout("hovermode", "closest")
}

/// Volume of several symbols, grouped bars
pub fn history_volume_figure(histories: &BTreeMap<String, PriceHistory>) -> Figure {
    let figure = Figure::empty("Volume Chart", "Date", "Volume");
    if histories.is_empty() {
        return figure;
    }

    let data = histories
        .iter()
        .filter(|(_, history)| !history.is_empty())
        .map(|(symbol, history)| {
            bar_trace(
                symbol,
                candle_times(history),
                history.candles.iter().map(|c| c.volume).collect(),
            )
        })
        .collect();
    Figure { data, ..figure }.with_layout("barmode", "group")
}
