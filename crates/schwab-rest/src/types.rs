//! Request builders and response types for the REST API

use crate::error::{RestError, RestResult};
use chrono::NaiveDate;
use schwab_types::{ContractType, FrequencyType, OptionStrategy, PeriodType, StreamerInfo, StrikeRange};
use serde::{Deserialize, Serialize};

/// Query string pairs
pub type Query = Vec<(&'static str, String)>;

// ============================================================================
// Price history
// ============================================================================

/// Price history request
///
/// Periods are snapped onto the values the API accepts and frequencies are
/// validated against the period type before a request is sent.
///
/// # Example
///
/// ```
/// use schwab_rest::PriceHistoryRequest;
/// use schwab_types::{FrequencyType, PeriodType};
///
/// let req = PriceHistoryRequest::new("AAPL")
///     .with_period(PeriodType::Month, 4)
///     .with_frequency(FrequencyType::Daily, 1);
/// assert_eq!(req.normalized_period(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistoryRequest {
    pub symbol: String,
    pub period_type: PeriodType,
    pub period: u32,
    pub frequency_type: Option<FrequencyType>,
    pub frequency: Option<u32>,
    /// Start of the range in milliseconds since the Unix epoch
    pub start_date: Option<i64>,
    /// End of the range in milliseconds since the Unix epoch
    pub end_date: Option<i64>,
    pub need_extended_hours_data: bool,
    pub need_previous_close: bool,
}

impl PriceHistoryRequest {
    /// One day of minute bars for a symbol
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            period_type: PeriodType::Day,
            period: 1,
            frequency_type: None,
            frequency: None,
            start_date: None,
            end_date: None,
            need_extended_hours_data: false,
            need_previous_close: false,
        }
    }

    pub fn with_period(mut self, period_type: PeriodType, period: u32) -> Self {
        self.period_type = period_type;
        self.period = period;
        self
    }

    pub fn with_frequency(mut self, frequency_type: FrequencyType, frequency: u32) -> Self {
        self.frequency_type = Some(frequency_type);
        self.frequency = Some(frequency);
        self
    }

    pub fn with_range(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.start_date = Some(start_ms);
        self.end_date = Some(end_ms);
        self
    }

    pub fn with_extended_hours(mut self, enabled: bool) -> Self {
        self.need_extended_hours_data = enabled;
        self
    }

    pub fn with_previous_close(mut self, enabled: bool) -> Self {
        self.need_previous_close = enabled;
        self
    }

    /// Requested period rounded up to the nearest accepted value
    pub fn normalized_period(&self) -> u32 {
        let allowed = self.period_type.allowed_periods();
        allowed
            .iter()
            .copied()
            .find(|&p| p >= self.period)
            .unwrap_or_else(|| allowed[allowed.len() - 1])
    }

    /// Frequency type, defaulting per period type
    pub fn effective_frequency_type(&self) -> FrequencyType {
        self.frequency_type.unwrap_or(match self.period_type {
            PeriodType::Day => FrequencyType::Minute,
            PeriodType::Month | PeriodType::Ytd => FrequencyType::Weekly,
            PeriodType::Year => FrequencyType::Monthly,
        })
    }

    /// Frequency snapped to the nearest accepted value
    pub fn normalized_frequency(&self) -> u32 {
        let allowed = self.effective_frequency_type().allowed_frequencies();
        let requested = self.frequency.unwrap_or(1);
        allowed
            .iter()
            .copied()
            .min_by_key(|&f| (f as i64 - requested as i64).abs())
            .unwrap_or(1)
    }

    /// Check symbol and frequency type against the period type
    pub fn validate(&self) -> RestResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(RestError::InvalidParameter("symbol is empty".into()));
        }
        let frequency_type = self.effective_frequency_type();
        if !self
            .period_type
            .allowed_frequency_types()
            .contains(&frequency_type)
        {
            return Err(RestError::InvalidParameter(format!(
                "frequency type {} is not valid for period type {}",
                frequency_type, self.period_type
            )));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(RestError::InvalidParameter(
                    "start date is after end date".into(),
                ));
            }
        }
        Ok(())
    }

    /// Validated query string
    pub fn to_query(&self) -> RestResult<Query> {
        self.validate()?;
        let mut query: Query = vec![
            ("symbol", self.symbol.trim().to_uppercase()),
            ("periodType", self.period_type.as_str().to_string()),
            ("period", self.normalized_period().to_string()),
            (
                "frequencyType",
                self.effective_frequency_type().as_str().to_string(),
            ),
            ("frequency", self.normalized_frequency().to_string()),
        ];
        if let Some(start) = self.start_date {
            query.push(("startDate", start.to_string()));
        }
        if let Some(end) = self.end_date {
            query.push(("endDate", end.to_string()));
        }
        if self.need_extended_hours_data {
            query.push(("needExtendedHoursData", "true".into()));
        }
        if self.need_previous_close {
            query.push(("needPreviousClose", "true".into()));
        }
        Ok(query)
    }
}

// ============================================================================
// Option chains
// ============================================================================

/// Option chain request
#[derive(Debug, Clone, PartialEq)]
pub struct OptionChainRequest {
    pub symbol: String,
    pub contract_type: ContractType,
    pub strike_count: Option<u32>,
    pub include_quotes: bool,
    pub strategy: OptionStrategy,
    pub interval: Option<f64>,
    pub strike: Option<f64>,
    pub range: StrikeRange,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// Three letter month (`JAN`) or `ALL`
    pub exp_month: Option<String>,
}

impl OptionChainRequest {
    /// Ten strikes of single-leg calls and puts with the underlying quote
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            contract_type: ContractType::All,
            strike_count: Some(10),
            include_quotes: true,
            strategy: OptionStrategy::Single,
            interval: None,
            strike: None,
            range: StrikeRange::All,
            from_date: None,
            to_date: None,
            exp_month: None,
        }
    }

    pub fn with_contract_type(mut self, contract_type: ContractType) -> Self {
        self.contract_type = contract_type;
        self
    }

    pub fn with_strike_count(mut self, count: u32) -> Self {
        self.strike_count = Some(count);
        self
    }

    pub fn with_include_quotes(mut self, include: bool) -> Self {
        self.include_quotes = include;
        self
    }

    pub fn with_strategy(mut self, strategy: OptionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_interval(mut self, interval: f64) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_strike(mut self, strike: f64) -> Self {
        self.strike = Some(strike);
        self
    }

    pub fn with_range(mut self, range: StrikeRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_dates(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from_date = Some(from);
        self.to_date = Some(to);
        self
    }

    pub fn with_exp_month(mut self, month: impl Into<String>) -> Self {
        self.exp_month = Some(month.into());
        self
    }

    /// Validated query string
    pub fn to_query(&self) -> RestResult<Query> {
        if self.symbol.trim().is_empty() {
            return Err(RestError::InvalidParameter("symbol is empty".into()));
        }
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                return Err(RestError::InvalidParameter(
                    "from date is after to date".into(),
                ));
            }
        }

        let mut query: Query = vec![
            ("symbol", self.symbol.trim().to_uppercase()),
            ("contractType", self.contract_type.as_str().to_string()),
            ("includeUnderlyingQuote", self.include_quotes.to_string()),
            ("strategy", self.strategy.as_str().to_string()),
            ("range", self.range.as_str().to_string()),
        ];
        if let Some(count) = self.strike_count {
            query.push(("strikeCount", count.to_string()));
        }
        if let Some(interval) = self.interval {
            query.push(("interval", interval.to_string()));
        }
        if let Some(strike) = self.strike {
            query.push(("strike", strike.to_string()));
        }
        if let Some(from) = self.from_date {
            query.push(("fromDate", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to_date {
            query.push(("toDate", to.format("%Y-%m-%d").to_string()));
        }
        if let Some(month) = &self.exp_month {
            query.push(("expMonth", month.to_uppercase()));
        }
        Ok(query)
    }
}

// ============================================================================
// Trader API types
// ============================================================================

/// Account number and the hash used in account URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub account_number: String,
    pub hash_value: String,
}

/// User preferences, including the streamer connection details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    #[serde(default)]
    pub accounts: Vec<serde_json::Value>,
    #[serde(default)]
    pub streamer_info: Vec<StreamerInfo>,
    #[serde(default)]
    pub offers: Vec<serde_json::Value>,
}

impl UserPreference {
    /// First streamer entry
    pub fn streamer_info(&self) -> Option<&StreamerInfo> {
        self.streamer_info.first()
    }
}
