//! Time period selection for history charts

use crate::error::{DashboardError, DashboardResult};
use schwab_types::{FrequencyType, PeriodType};

/// Time period used when a request names none
pub const DEFAULT_PERIOD: &str = "day_1";

/// Parse a period selector such as `day_1`, `month_3` or `year_5`
pub fn parse_time_period(period: &str) -> DashboardResult<(PeriodType, u32)> {
    let invalid = || DashboardError::InvalidPeriod(period.to_string());

    let (kind, count) = period.trim().split_once('_').ok_or_else(invalid)?;
    let period_type: PeriodType = kind.parse().map_err(|_| invalid())?;
    let count: u32 = count.parse().map_err(|_| invalid())?;
    if count == 0 {
        return Err(invalid());
    }
    Ok((period_type, count))
}

/// Bar frequency suited to a period
///
/// Intraday periods get minute bars, months get daily bars and years get
/// weekly or monthly bars.
pub fn determine_frequency(period_type: PeriodType, period: u32) -> (FrequencyType, u32) {
    match period_type {
        PeriodType::Day if period <= 1 => (FrequencyType::Minute, 5),
        PeriodType::Day => (FrequencyType::Minute, 30),
        PeriodType::Month => (FrequencyType::Daily, 1),
        PeriodType::Year if period <= 1 => (FrequencyType::Weekly, 1),
        PeriodType::Year => (FrequencyType::Monthly, 1),
        PeriodType::Ytd => (FrequencyType::Daily, 1),
    }
}
