//! Saving and loading market data files

use crate::error::{DataError, DataResult};
use crate::table::Table;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use schwab_types::{Candle, ContractType, OptionChain, OptionContract, PriceHistory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

const CANDLE_HEADERS: [&str; 6] = ["datetime", "open", "high", "low", "close", "volume"];

const OPTION_HEADERS: [&str; 18] = [
    "symbol",
    "putCall",
    "description",
    "strikePrice",
    "expirationDate",
    "daysToExpiration",
    "bid",
    "ask",
    "last",
    "totalVolume",
    "openInterest",
    "volatility",
    "delta",
    "gamma",
    "theta",
    "vega",
    "rho",
    "inTheMoney",
];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File format for saved data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Json,
}

impl DataFormat {
    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Format implied by a path's extension
    pub fn from_path(path: &Path) -> DataResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
            .map_err(|_| DataError::UnsupportedFormat(format!("unsupported file type: {}", path.display())))
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DataFormat {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(DataError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Data that can be written to and read back from disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SavedData {
    /// Price history bars
    Candles(Vec<Candle>),
    /// Flattened option chain
    Options(Vec<OptionContract>),
    /// Any other JSON, e.g. quote responses
    Records(Value),
}

impl From<PriceHistory> for SavedData {
    fn from(history: PriceHistory) -> Self {
        Self::Candles(history.candles)
    }
}

impl From<&OptionChain> for SavedData {
    fn from(chain: &OptionChain) -> Self {
        Self::Options(chain.contracts(ContractType::All).into_iter().cloned().collect())
    }
}

impl SavedData {
    /// Number of rows or records
    pub fn len(&self) -> usize {
        match self {
            Self::Candles(c) => c.len(),
            Self::Options(o) => o.len(),
            Self::Records(Value::Array(items)) => items.len(),
            Self::Records(Value::Null) => 0,
            Self::Records(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encode as a CSV table
    pub fn to_table(&self) -> DataResult<Table> {
        match self {
            Self::Candles(candles) => {
                let mut table = Table::new(CANDLE_HEADERS);
                for c in candles {
                    table.push_row(vec![
                        c.timestamp().format(DATETIME_FORMAT).to_string(),
                        c.open.to_string(),
                        c.high.to_string(),
                        c.low.to_string(),
                        c.close.to_string(),
                        c.volume.to_string(),
                    ]);
                }
                Ok(table)
            }
            Self::Options(contracts) => {
                let mut table = Table::new(OPTION_HEADERS);
                for c in contracts {
                    table.push_row(option_row(c));
                }
                Ok(table)
            }
            Self::Records(value) => records_table(value),
        }
    }

    /// Decode a CSV table, recognizing candle and option layouts by header
    pub fn from_table(table: &Table) -> DataResult<Self> {
        if table.headers == CANDLE_HEADERS {
            let candles = table
                .rows
                .iter()
                .enumerate()
                .map(|(i, row)| parse_candle(row, i + 2))
                .collect::<DataResult<Vec<_>>>()?;
            return Ok(Self::Candles(candles));
        }
        if table.column("symbol").is_some() && table.column("putCall").is_some() {
            let contracts = table
                .rows
                .iter()
                .enumerate()
                .map(|(i, row)| parse_option(table, row, i + 2))
                .collect::<DataResult<Vec<_>>>()?;
            return Ok(Self::Options(contracts));
        }

        let records = table
            .rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = table
                    .headers
                    .iter()
                    .zip(row)
                    .map(|(h, cell)| (h.clone(), infer_value(cell)))
                    .collect();
                Value::Object(object)
            })
            .collect();
        Ok(Self::Records(Value::Array(records)))
    }
}

/// File name `{name}_{YYYYmmdd_HHMMSS}.{ext}`
pub fn timestamped_file_name(name: &str, format: DataFormat, now: DateTime<Local>) -> String {
    format!("{}_{}.{}", name, now.format("%Y%m%d_%H%M%S"), format.extension())
}

/// Write data into `dir` under a timestamped name; returns the path
pub fn save(dir: &Path, data: &SavedData, name: &str, format: DataFormat) -> DataResult<PathBuf> {
    let path = dir.join(timestamped_file_name(name, format, Local::now()));
    let contents = match format {
        DataFormat::Csv => data.to_table()?.to_csv(),
        DataFormat::Json => serde_json::to_string(data)?,
    };
    fs::write(&path, contents)?;
    info!("Data saved to {}", path.display());
    Ok(path)
}

/// Read a file written by [`save`], choosing the decoder by extension
pub fn load(path: &Path) -> DataResult<SavedData> {
    let format = DataFormat::from_path(path)?;
    let text = fs::read_to_string(path)?;
    let data = match format {
        DataFormat::Json => serde_json::from_str(&text)?,
        DataFormat::Csv => SavedData::from_table(&Table::parse(&text)?)?,
    };
    info!("Data loaded from {}", path.display());
    Ok(data)
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn option_row(c: &OptionContract) -> Vec<String> {
    vec![
        c.symbol.clone(),
        c.put_call.clone(),
        c.description.clone(),
        c.strike_price.to_string(),
        c.expiration_date.clone(),
        c.days_to_expiration.to_string(),
        c.bid.to_string(),
        c.ask.to_string(),
        c.last.to_string(),
        c.total_volume.to_string(),
        c.open_interest.to_string(),
        opt(c.volatility),
        opt(c.delta),
        opt(c.gamma),
        opt(c.theta),
        opt(c.vega),
        opt(c.rho),
        c.in_the_money.to_string(),
    ]
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

fn records_table(value: &Value) -> DataResult<Table> {
    let objects: Vec<&Map<String, Value>> = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object()
                    .ok_or_else(|| DataError::UnsupportedFormat("csv needs an array of objects".into()))
            })
            .collect::<DataResult<_>>()?,
        Value::Object(object) => vec![object],
        _ => return Err(DataError::UnsupportedFormat("csv needs tabular data".into())),
    };

    // Columns in first-seen order
    let mut headers: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut table = Table::new(headers.clone());
    for object in objects {
        table.push_row(
            headers
                .iter()
                .map(|h| object.get(h).map(cell_text).unwrap_or_default())
                .collect(),
        );
    }
    Ok(table)
}

fn infer_value(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        return Value::from(f);
    }
    match cell {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn parse_num<T: FromStr>(cell: &str, column: &str, line: usize) -> DataResult<T> {
    cell.trim()
        .parse()
        .map_err(|_| DataError::csv(line, format!("invalid {}: {:?}", column, cell)))
}

fn parse_opt_f64(cell: &str, column: &str, line: usize) -> DataResult<Option<f64>> {
    if cell.trim().is_empty() {
        Ok(None)
    } else {
        parse_num(cell, column, line).map(Some)
    }
}

fn parse_datetime(cell: &str, line: usize) -> DataResult<i64> {
    let cell = cell.trim();
    if let Ok(millis) = cell.parse::<i64>() {
        return Ok(millis);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(cell, DATETIME_FORMAT) {
        return Ok(naive.and_utc().timestamp_millis());
    }
    DateTime::parse_from_rfc3339(cell)
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|_| DataError::csv(line, format!("invalid datetime: {:?}", cell)))
}

fn parse_candle(row: &[String], line: usize) -> DataResult<Candle> {
    Ok(Candle {
        datetime: parse_datetime(&row[0], line)?,
        open: parse_num(&row[1], "open", line)?,
        high: parse_num(&row[2], "high", line)?,
        low: parse_num(&row[3], "low", line)?,
        close: parse_num(&row[4], "close", line)?,
        volume: parse_num(&row[5], "volume", line)?,
    })
}

fn parse_option(table: &Table, row: &[String], line: usize) -> DataResult<OptionContract> {
    let cell = |name: &str| -> &str {
        table
            .column(name)
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .unwrap_or_default()
    };
    let num_or_default = |name: &str| -> DataResult<f64> {
        let value = cell(name);
        if value.trim().is_empty() {
            Ok(0.0)
        } else {
            parse_num(value, name, line)
        }
    };
    let count = |name: &str| -> DataResult<u64> {
        let value = cell(name);
        if value.trim().is_empty() {
            Ok(0)
        } else {
            parse_num(value, name, line)
        }
    };

    Ok(OptionContract {
        put_call: cell("putCall").to_string(),
        symbol: cell("symbol").to_string(),
        description: cell("description").to_string(),
        bid: num_or_default("bid")?,
        ask: num_or_default("ask")?,
        last: num_or_default("last")?,
        total_volume: count("totalVolume")?,
        open_interest: count("openInterest")?,
        volatility: parse_opt_f64(cell("volatility"), "volatility", line)?,
        delta: parse_opt_f64(cell("delta"), "delta", line)?,
        gamma: parse_opt_f64(cell("gamma"), "gamma", line)?,
        theta: parse_opt_f64(cell("theta"), "theta", line)?,
        vega: parse_opt_f64(cell("vega"), "vega", line)?,
        rho: parse_opt_f64(cell("rho"), "rho", line)?,
        strike_price: num_or_default("strikePrice")?,
        expiration_date: cell("expirationDate").to_string(),
        days_to_expiration: {
            let value = cell("daysToExpiration");
            if value.trim().is_empty() {
                0
            } else {
                parse_num(value, "daysToExpiration", line)?
            }
        },
        in_the_money: cell("inTheMoney").eq_ignore_ascii_case("true"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("schwab-store-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn candles() -> Vec<Candle> {
        vec![
            Candle {
                datetime: 1_704_067_200_000,
                open: 184.2,
                high: 186.1,
                low: 183.9,
                close: 185.6,
                volume: 48_213_544,
            },
            Candle {
                datetime: 1_704_153_600_000,
                open: 185.6,
                high: 187.0,
                low: 185.0,
                close: 186.5,
                volume: 30_000_000,
            },
        ]
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<DataFormat>().unwrap(), DataFormat::Csv);
        assert_eq!("json".parse::<DataFormat>().unwrap(), DataFormat::Json);
        assert!(matches!(
            "pickle".parse::<DataFormat>(),
            Err(DataError::UnsupportedFormat(_))
        ));
        assert!(DataFormat::from_path(Path::new("x/data.pkl")).is_err());
    }

    #[test]
    fn test_timestamped_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(
            timestamped_file_name("AAPL_history", DataFormat::Csv, now),
            "AAPL_history_20240305_140709.csv"
        );
    }

    #[test]
    fn test_candles_csv_file() {
        let dir = temp_dir("candles");
        let data = SavedData::Candles(candles());
        let path = save(&dir, &data, "AAPL", DataFormat::Csv).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("datetime,open,high,low,close,volume\n2024-01-01 00:00:00,184.2,"));
        assert_eq!(load(&path).unwrap(), data);
    }

    #[test]
    fn test_options_csv_keeps_optional_greeks() {
        let contract = OptionContract {
            put_call: "PUT".into(),
            symbol: "AAPL  240119P00150000".into(),
            description: "AAPL Jan 19 2024 150 Put, weekly".into(),
            strike_price: 150.0,
            expiration_date: "2024-01-19T21:00:00.000+00:00".into(),
            delta: Some(-0.42),
            open_interest: 120,
            ..Default::default()
        };
        let table = SavedData::Options(vec![contract.clone()]).to_table().unwrap();
        let parsed = SavedData::from_table(&Table::parse(&table.to_csv()).unwrap()).unwrap();
        match parsed {
            SavedData::Options(contracts) => {
                assert_eq!(contracts, vec![contract]);
                assert_eq!(contracts[0].gamma, None);
            }
            other => panic!("expected options, got {:?}", other),
        }
    }

    #[test]
    fn test_json_file_detects_shape() {
        let dir = temp_dir("json");
        let path = save(&dir, &SavedData::Candles(candles()), "bars", DataFormat::Json).unwrap();
        assert!(matches!(load(&path).unwrap(), SavedData::Candles(c) if c.len() == 2));

        let quotes = SavedData::Records(json!({"AAPL": {"lastPrice": 185.5}}));
        let path = save(&dir, &quotes, "quotes", DataFormat::Json).unwrap();
        assert_eq!(load(&path).unwrap(), quotes);
    }

    #[test]
    fn test_records_csv() {
        let data = SavedData::Records(json!([
            {"symbol": "AAPL", "last": 185.5},
            {"symbol": "MSFT", "volume": 10, "halted": false}
        ]));
        let table = data.to_table().unwrap();
        // Keys of each object come out sorted; new keys append
        assert_eq!(table.headers, vec!["last", "symbol", "halted", "volume"]);
        assert_eq!(table.rows[0], vec!["185.5", "AAPL", "", ""]);

        let back = SavedData::from_table(&table).unwrap();
        assert_eq!(
            back,
            SavedData::Records(json!([
                {"symbol": "AAPL", "last": 185.5, "volume": null, "halted": null},
                {"symbol": "MSFT", "last": null, "volume": 10, "halted": false}
            ]))
        );

        assert!(SavedData::Records(json!(3)).to_table().is_err());
    }

    #[test]
    fn test_load_unsupported_extension() {
        let dir = temp_dir("ext");
        let path = dir.join("data.pkl");
        fs::write(&path, b"x").unwrap();
        assert!(matches!(load(&path), Err(DataError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_invalid_candle_row() {
        let table = Table::parse("datetime,open,high,low,close,volume\n2024-01-01 00:00:00,x,1,1,1,1\n").unwrap();
        assert!(matches!(
            SavedData::from_table(&table),
            Err(DataError::Csv { line: 2, .. })
        ));
    }
}
