//! Dashboard configuration from environment variables

use crate::error::{DashboardError, DashboardResult};
use std::path::PathBuf;
use std::time::Duration;

/// Symbols shown when `DASHBOARD_SYMBOLS` is not set
pub const DEFAULT_SYMBOLS: [&str; 5] = ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"];

/// Dashboard settings
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
    pub symbols: Vec<String>,
    /// How often the stream monitor checks for stale symbols
    pub update_interval: Duration,
    pub data_dir: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8050,
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            update_interval: Duration::from_secs(5),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl DashboardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.env` when present, then read the `DASHBOARD_*` and
    /// `SCHWAB_DATA_DIR` variables
    pub fn from_env() -> DashboardResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep defaults
    pub fn from_lookup<F>(lookup: F) -> DashboardResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("DASHBOARD_HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup("DASHBOARD_PORT") {
            config.port = port.trim().parse().map_err(|_| DashboardError::InvalidConfig {
                name: "DASHBOARD_PORT",
                value: port,
            })?;
        }
        if let Some(symbols) = lookup("DASHBOARD_SYMBOLS") {
            let parsed = parse_symbols(&symbols);
            if parsed.is_empty() {
                return Err(DashboardError::InvalidConfig {
                    name: "DASHBOARD_SYMBOLS",
                    value: symbols,
                });
            }
            config.symbols = parsed;
        }
        if let Some(secs) = lookup("DASHBOARD_UPDATE_INTERVAL_SECS") {
            let parsed: u64 = secs
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(DashboardError::InvalidConfig {
                    name: "DASHBOARD_UPDATE_INTERVAL_SECS",
                    value: secs,
                })?;
            config.update_interval = Duration::from_secs(parsed);
        }
        if let Some(dir) = lookup("SCHWAB_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_symbols<S: AsRef<str>>(mut self, symbols: &[S]) -> Self {
        self.symbols = symbols.iter().map(|s| s.as_ref().to_uppercase()).collect();
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// `host:port` to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated symbol list, upper-casing and dropping blanks
/// and repeats
fn parse_symbols(list: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in list.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8050");
        assert_eq!(config.symbols, vec!["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"]);
        assert_eq!(config.update_interval, Duration::from_secs(5));
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_overrides() {
        let config = DashboardConfig::from_lookup(lookup(&[
            ("DASHBOARD_HOST", "127.0.0.1"),
            ("DASHBOARD_PORT", "9000"),
            ("DASHBOARD_SYMBOLS", "spy, qqq,,SPY"),
            ("DASHBOARD_UPDATE_INTERVAL_SECS", "2"),
            ("SCHWAB_DATA_DIR", "/tmp/schwab"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.symbols, vec!["SPY", "QQQ"]);
        assert_eq!(config.update_interval, Duration::from_secs(2));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/schwab"));
    }

    #[test]
    fn test_invalid_values() {
        let err = DashboardConfig::from_lookup(lookup(&[("DASHBOARD_PORT", "http")])).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidConfig { name: "DASHBOARD_PORT", .. }));

        let err = DashboardConfig::from_lookup(lookup(&[("DASHBOARD_SYMBOLS", " , ")])).unwrap_err();
        assert!(matches!(err, DashboardError::InvalidConfig { name: "DASHBOARD_SYMBOLS", .. }));

        let err = DashboardConfig::from_lookup(lookup(&[("DASHBOARD_UPDATE_INTERVAL_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(
            err,
            DashboardError::InvalidConfig { name: "DASHBOARD_UPDATE_INTERVAL_SECS", .. }
        ));
    }
}
