//! Unified access to historical and real-time data

use crate::error::{DataError, DataResult};
use crate::store::{self, DataFormat, SavedData};

use dashmap::DashMap;
use schwab_rest::{OptionChainRequest, PriceHistoryRequest, SchwabRestClient};
use schwab_stream::{DataHandler, Streamer};
use schwab_types::{DataType, FrequencyType, OptionChain, PeriodType, PriceHistory, QuoteResponse};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// Facade over the REST client, the shared streamer and local data files
///
/// # Example
///
/// ```no_run
/// use schwab_data::DataManager;
/// use schwab_rest::{SchwabRestClient, StaticToken};
/// use schwab_stream::{StaticStreamerAuth, Streamer};
/// use schwab_types::{FrequencyType, PeriodType};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let rest = SchwabRestClient::new(Arc::new(StaticToken::new("token")))?;
/// let streamer = Streamer::get_instance(Arc::new(StaticStreamerAuth::for_url("wss://streamer", "token")));
/// let manager = DataManager::new(rest, streamer, "data")?;
///
/// let history = manager
///     .get_price_history("AAPL", PeriodType::Day, 10, FrequencyType::Minute, 1, true)
///     .await?;
/// manager.save_data(&history.into(), "AAPL_history", "csv")?;
/// # Ok(())
/// # }
/// ```
pub struct DataManager {
    rest: SchwabRestClient,
    streamer: Arc<Streamer>,
    cache: DashMap<String, PriceHistory>,
    data_dir: PathBuf,
}

impl std::fmt::Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager")
            .field("data_dir", &self.data_dir)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Cache key of a price history request
pub fn cache_key(
    symbol: &str,
    period_type: PeriodType,
    period: u32,
    frequency_type: FrequencyType,
    frequency: u32,
) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        symbol, period_type, period, frequency_type, frequency
    )
}

impl DataManager {
    /// Create a manager, creating the data directory if missing
    pub fn new(
        rest: SchwabRestClient,
        streamer: Arc<Streamer>,
        data_dir: impl Into<PathBuf>,
    ) -> DataResult<Self> {
        let data_dir = data_dir.into();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)?;
            info!("Created data directory: {}", data_dir.display());
        }
        Ok(Self {
            rest,
            streamer,
            cache: DashMap::new(),
            data_dir,
        })
    }

    pub fn rest(&self) -> &SchwabRestClient {
        &self.rest
    }

    pub fn streamer(&self) -> &Arc<Streamer> {
        &self.streamer
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Price history for a symbol
    ///
    /// With `use_cache`, a previously fetched non-empty result for the same
    /// parameters is returned without a request.
    #[instrument(skip(self))]
    pub async fn get_price_history(
        &self,
        symbol: &str,
        period_type: PeriodType,
        period: u32,
        frequency_type: FrequencyType,
        frequency: u32,
        use_cache: bool,
    ) -> DataResult<PriceHistory> {
        let key = cache_key(symbol, period_type, period, frequency_type, frequency);
        if use_cache {
            if let Some(cached) = self.cache.get(&key) {
                info!("Using cached price history for {}", symbol);
                return Ok(cached.clone());
            }
        }

        let request = PriceHistoryRequest::new(symbol)
            .with_period(period_type, period)
            .with_frequency(frequency_type, frequency);
        let history = self.rest.get_price_history(&request).await?;

        if !history.is_empty() {
            self.cache.insert(key, history.clone());
        }
        Ok(history)
    }

    /// Alias of [`DataManager::get_price_history`]
    pub async fn get_historical_data(
        &self,
        symbol: &str,
        period_type: PeriodType,
        period: u32,
        frequency_type: FrequencyType,
        frequency: u32,
        use_cache: bool,
    ) -> DataResult<PriceHistory> {
        self.get_price_history(symbol, period_type, period, frequency_type, frequency, use_cache)
            .await
    }

    /// Drop every cached price history
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cached keys, sorted
    pub fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.cache.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Option chain for the request's symbol
    #[instrument(skip(self, request), fields(symbol = %request.symbol))]
    pub async fn get_option_chain(&self, request: &OptionChainRequest) -> DataResult<OptionChain> {
        info!("Retrieving option chain for {}", request.symbol);
        Ok(self.rest.get_option_chain(request).await?)
    }

    /// Alias of [`DataManager::get_option_chain`]
    pub async fn get_options_chain(&self, request: &OptionChainRequest) -> DataResult<OptionChain> {
        self.get_option_chain(request).await
    }

    /// Quotes for one or more symbols
    #[instrument(skip(self))]
    pub async fn get_quote(&self, symbols: &[&str]) -> DataResult<QuoteResponse> {
        Ok(self.rest.get_quotes(symbols).await?)
    }

    /// Register handlers, then start streaming the symbols
    pub fn start_streaming<S: AsRef<str>, F: AsRef<str>>(
        &self,
        symbols: &[S],
        fields: &[F],
        handlers: impl IntoIterator<Item = (DataType, DataHandler)>,
    ) -> DataResult<bool> {
        for (data_type, handler) in handlers {
            self.streamer.handlers().register_arc(data_type, handler);
        }
        Ok(self.streamer.start_streaming(symbols, fields)?)
    }

    /// Stop the shared streamer
    pub fn stop_streaming(&self) {
        self.streamer.stop_streaming();
    }

    /// Save data under the data directory
    ///
    /// `format` is `csv` or `json`. Returns the written path.
    pub fn save_data(&self, data: &SavedData, name: &str, format: &str) -> DataResult<PathBuf> {
        let format: DataFormat = format.parse()?;
        store::save(&self.data_dir, data, name, format)
    }

    /// Load a file saved by [`DataManager::save_data`]
    pub fn load_data(&self, path: impl AsRef<Path>) -> DataResult<SavedData> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        store::load(path)
    }
}
