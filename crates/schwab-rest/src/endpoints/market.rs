//! Market data endpoints

use super::RequestContext;
use crate::error::{RestError, RestResult};
use crate::types::{OptionChainRequest, PriceHistoryRequest};
use schwab_types::{OptionChain, PriceHistory, QuoteEntry, QuoteResponse};
use tracing::{debug, instrument, warn};

const MARKET_DATA_PATH: &str = "/marketdata/v1";

/// Market data endpoints
pub struct MarketEndpoints<'a> {
    ctx: RequestContext<'a>,
}

impl<'a> MarketEndpoints<'a> {
    pub fn new(ctx: RequestContext<'a>) -> Self {
        Self { ctx }
    }

    /// Get quotes for one or more symbols
    #[instrument(skip(self))]
    pub async fn get_quotes(&self, symbols: &[&str]) -> RestResult<QuoteResponse> {
        if symbols.is_empty() {
            return Err(RestError::InvalidParameter("no symbols given".into()));
        }
        let symbols: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
        debug!("Fetching quotes for {} symbols", symbols.len());

        let response: QuoteResponse = self
            .ctx
            .get_json(
                &format!("{}/quotes", MARKET_DATA_PATH),
                &[("symbols", symbols.join(","))],
            )
            .await?;

        if !response.invalid_symbols().is_empty() {
            warn!("Invalid symbols: {:?}", response.invalid_symbols());
        }
        Ok(response)
    }

    /// Get the quote for a single symbol
    #[instrument(skip(self))]
    pub async fn get_quote(&self, symbol: &str) -> RestResult<QuoteEntry> {
        let symbol = symbol.trim().to_uppercase();
        let mut response = self.get_quotes(&[symbol.as_str()]).await?;
        response
            .quotes
            .remove(&symbol)
            .ok_or(RestError::SymbolNotFound(symbol))
    }

    /// Get price history
    #[instrument(skip(self), fields(symbol = %request.symbol))]
    pub async fn get_price_history(&self, request: &PriceHistoryRequest) -> RestResult<PriceHistory> {
        let query = request.to_query()?;
        debug!("Fetching price history: {:?}", query);

        let mut history: PriceHistory = self
            .ctx
            .get_json(&format!("{}/pricehistory", MARKET_DATA_PATH), &query)
            .await?;
        if history.symbol.is_empty() {
            history.symbol = request.symbol.trim().to_uppercase();
        }
        Ok(history)
    }

    /// Get an option chain
    #[instrument(skip(self), fields(symbol = %request.symbol))]
    pub async fn get_option_chain(&self, request: &OptionChainRequest) -> RestResult<OptionChain> {
        let query = request.to_query()?;
        debug!("Fetching option chain: {:?}", query);

        let chain: OptionChain = self
            .ctx
            .get_json(&format!("{}/chains", MARKET_DATA_PATH), &query)
            .await?;
        if chain.status.eq_ignore_ascii_case("FAILED") {
            return Err(RestError::SymbolNotFound(request.symbol.clone()));
        }
        Ok(chain)
    }
}
