//! Table payloads and option chain analytics

use schwab_data::{DataResult, SavedData, Table};
use schwab_types::{ContractType, OptionChain, OptionContract, PriceHistory};
use serde::Serialize;

/// Rows shown by [`data_table`] when the request names no limit
pub const DEFAULT_MAX_ROWS: usize = 50;

/// Columns of the option chain table
pub const OPTION_COLUMNS: [&str; 13] = [
    "Strike", "Expiration", "Type", "Symbol", "Bid", "Ask", "Last", "Volume", "Open Int", "Delta",
    "Gamma", "Theta", "Vega",
];

pub(crate) fn money(value: f64) -> String {
    format!("${:.2}", value)
}

pub(crate) fn greek(value: Option<f64>) -> String {
    format!("{:.3}", value.unwrap_or(0.0))
}

fn contract_row(contract: &OptionContract) -> Vec<String> {
    vec![
        format!("{:.2}", contract.strike_price),
        contract.expiration_day().to_string(),
        if contract.is_call() { "CALL" } else { "PUT" }.to_string(),
        contract.symbol.clone(),
        money(contract.bid),
        money(contract.ask),
        money(contract.last),
        contract.total_volume.to_string(),
        contract.open_interest.to_string(),
        greek(contract.delta),
        greek(contract.gamma),
        greek(contract.theta),
        greek(contract.vega),
    ]
}

/// Option chain rows, calls before puts, filtered by contract type
pub fn option_chain_table(chain: &OptionChain, filter: ContractType) -> Table {
    let mut table = Table::new(OPTION_COLUMNS);
    for contract in chain.contracts(filter) {
        table.push_row(contract_row(contract));
    }
    table
}

/// Expiration dates (`YYYY-MM-DD`) offered in the chain
pub fn expiration_dates(chain: &OptionChain) -> Vec<String> {
    chain.expiration_dates()
}

/// Volume and open interest totals with put/call ratios
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct OptionMetrics {
    pub call_volume_total: u64,
    pub put_volume_total: u64,
    pub call_open_interest_total: u64,
    pub put_open_interest_total: u64,
    /// Put volume over call volume, 0 without call volume
    pub put_call_ratio_volume: f64,
    /// Put open interest over call open interest, 0 without call open interest
    pub put_call_ratio_oi: f64,
}

/// Totals and ratios over every contract of the chain
pub fn option_metrics(chain: &OptionChain) -> OptionMetrics {
    let mut metrics = OptionMetrics::default();
    for contract in chain.contracts(ContractType::All) {
        if contract.is_call() {
            metrics.call_volume_total += contract.total_volume;
            metrics.call_open_interest_total += contract.open_interest;
        } else {
            metrics.put_volume_total += contract.total_volume;
            metrics.put_open_interest_total += contract.open_interest;
        }
    }

    if metrics.call_volume_total > 0 {
        metrics.put_call_ratio_volume =
            metrics.put_volume_total as f64 / metrics.call_volume_total as f64;
    }
    if metrics.call_open_interest_total > 0 {
        metrics.put_call_ratio_oi =
            metrics.put_open_interest_total as f64 / metrics.call_open_interest_total as f64;
    }
    metrics
}

/// Header and the first `max_rows` bars of a history
pub fn data_table(history: &PriceHistory, max_rows: usize) -> DataResult<Table> {
    let mut table = SavedData::from(history.clone()).to_table()?;
    table.truncate(max_rows);
    Ok(table)
}
