//! Period, frequency, option and streamer service enums

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when an enum cannot be parsed from a string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Enum being parsed
    pub kind: &'static str,
    /// Rejected input
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Price history period type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    /// Intraday periods
    #[default]
    Day,
    /// Monthly periods
    Month,
    /// Yearly periods
    Year,
    /// Year to date
    Ytd,
}

impl PeriodType {
    /// Returns the name used in API query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::Ytd => "ytd",
        }
    }

    /// Periods the price history endpoint accepts for this period type
    pub fn allowed_periods(&self) -> &'static [u32] {
        match self {
            Self::Day => &[1, 2, 3, 4, 5, 10],
            Self::Month => &[1, 2, 3, 6],
            Self::Year => &[1, 2, 3, 5, 10, 15, 20],
            Self::Ytd => &[1],
        }
    }

    /// Frequency types the price history endpoint accepts for this period type
    pub fn allowed_frequency_types(&self) -> &'static [FrequencyType] {
        match self {
            Self::Day => &[FrequencyType::Minute],
            Self::Month => &[FrequencyType::Daily, FrequencyType::Weekly],
            Self::Year => &[
                FrequencyType::Daily,
                FrequencyType::Weekly,
                FrequencyType::Monthly,
            ],
            Self::Ytd => &[FrequencyType::Daily, FrequencyType::Weekly],
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "ytd" => Ok(Self::Ytd),
            _ => Err(ParseEnumError::new("period type", s)),
        }
    }
}

/// Price history bar frequency type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyType {
    /// Minute bars
    #[default]
    Minute,
    /// Daily bars
    Daily,
    /// Weekly bars
    Weekly,
    /// Monthly bars
    Monthly,
}

impl FrequencyType {
    /// Returns the name used in API query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Frequencies the price history endpoint accepts for this frequency type
    pub fn allowed_frequencies(&self) -> &'static [u32] {
        match self {
            Self::Minute => &[1, 5, 10, 15, 30],
            Self::Daily | Self::Weekly | Self::Monthly => &[1],
        }
    }
}

impl fmt::Display for FrequencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrequencyType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minute" => Ok(Self::Minute),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(ParseEnumError::new("frequency type", s)),
        }
    }
}

/// Option contract type filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractType {
    /// Calls only
    Call,
    /// Puts only
    Put,
    /// Calls and puts
    #[default]
    All,
}

impl ContractType {
    /// Returns the name used in API query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::Put => "PUT",
            Self::All => "ALL",
        }
    }

    /// Whether calls pass this filter
    pub fn includes_calls(&self) -> bool {
        matches!(self, Self::Call | Self::All)
    }

    /// Whether puts pass this filter
    pub fn includes_puts(&self) -> bool {
        matches!(self, Self::Put | Self::All)
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = ParseEnumError;

    /// Accepts API names (`CALL`, `PUT`, `ALL`) and the dashboard's
    /// filter names (`calls`, `puts`, `both`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" | "calls" => Ok(Self::Call),
            "put" | "puts" => Ok(Self::Put),
            "all" | "both" => Ok(Self::All),
            _ => Err(ParseEnumError::new("contract type", s)),
        }
    }
}

/// Option chain strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionStrategy {
    #[default]
    Single,
    Analytical,
    Covered,
    Vertical,
    Calendar,
    Strangle,
    Straddle,
    Butterfly,
    Condor,
    Diagonal,
    Collar,
    Roll,
}

impl OptionStrategy {
    /// Returns the name used in API query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Analytical => "ANALYTICAL",
            Self::Covered => "COVERED",
            Self::Vertical => "VERTICAL",
            Self::Calendar => "CALENDAR",
            Self::Strangle => "STRANGLE",
            Self::Straddle => "STRADDLE",
            Self::Butterfly => "BUTTERFLY",
            Self::Condor => "CONDOR",
            Self::Diagonal => "DIAGONAL",
            Self::Collar => "COLLAR",
            Self::Roll => "ROLL",
        }
    }
}

/// Strike range relative to the underlying price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StrikeRange {
    /// In the money
    #[serde(rename = "ITM")]
    InTheMoney,
    /// Near the money
    #[serde(rename = "NTM")]
    NearTheMoney,
    /// Out of the money
    #[serde(rename = "OTM")]
    OutOfTheMoney,
    /// Strikes above market
    #[serde(rename = "SAK")]
    StrikesAboveMarket,
    /// Strikes below market
    #[serde(rename = "SBK")]
    StrikesBelowMarket,
    /// Strikes near market
    #[serde(rename = "SNK")]
    StrikesNearMarket,
    /// All strikes
    #[default]
    #[serde(rename = "ALL")]
    All,
}

impl StrikeRange {
    /// Returns the name used in API query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InTheMoney => "ITM",
            Self::NearTheMoney => "NTM",
            Self::OutOfTheMoney => "OTM",
            Self::StrikesAboveMarket => "SAK",
            Self::StrikesBelowMarket => "SBK",
            Self::StrikesNearMarket => "SNK",
            Self::All => "ALL",
        }
    }
}

/// Streamer service names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Service {
    /// Login, logout and connection notices
    Admin,
    /// Level one equity quotes
    LevelOneEquities,
    /// Level one option quotes
    LevelOneOptions,
    /// Any service this client does not decode
    Unknown(String),
}

impl Service {
    /// Parse a service name as sent by the streamer
    pub fn parse(s: &str) -> Self {
        match s {
            "ADMIN" => Self::Admin,
            "LEVELONE_EQUITIES" => Self::LevelOneEquities,
            "LEVELONE_OPTIONS" => Self::LevelOneOptions,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the service name as used on the wire
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "ADMIN",
            Self::LevelOneEquities => "LEVELONE_EQUITIES",
            Self::LevelOneOptions => "LEVELONE_OPTIONS",
            Self::Unknown(name) => name,
        }
    }

    /// Handler data type produced by this service, if any
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::LevelOneEquities => Some(DataType::Quote),
            Self::LevelOneOptions => Some(DataType::Option),
            Self::Admin | Self::Unknown(_) => None,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Service {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Service {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Kind of real-time record a data handler is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// Equity quote updates
    Quote,
    /// Option quote updates
    Option,
}

impl DataType {
    /// Returns the handler key name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "QUOTE",
            Self::Option => "OPTION",
        }
    }

    /// Streamer service carrying this data type
    pub fn service(&self) -> Service {
        match self {
            Self::Quote => Service::LevelOneEquities,
            Self::Option => Service::LevelOneOptions,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUOTE" => Ok(Self::Quote),
            "OPTION" => Ok(Self::Option),
            _ => Err(ParseEnumError::new("data type", s)),
        }
    }
}
