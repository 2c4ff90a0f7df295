//! Main REST client implementation

use crate::endpoints::{MarketEndpoints, RequestContext, TraderEndpoints};
use crate::error::RestResult;
use crate::token_source::TokenSource;
use crate::types::{LinkedAccount, OptionChainRequest, PriceHistoryRequest, UserPreference};
use reqwest::Client;
use schwab_types::{OptionChain, PriceHistory, QuoteEntry, QuoteResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default API host
pub const DEFAULT_BASE_URL: &str = "https://api.schwabapi.com";

/// Schwab REST API client
///
/// # Example
///
/// ```no_run
/// use schwab_auth::TokenProvider;
/// use schwab_rest::{PriceHistoryRequest, SchwabRestClient};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = TokenProvider::from_env()?;
///     let client = SchwabRestClient::new(Arc::new(provider))?;
///
///     let quote = client.get_quote("AAPL").await?;
///     println!("{:?}", quote.quote.last_price);
///
///     let history = client.get_price_history(&PriceHistoryRequest::new("AAPL")).await?;
///     println!("{} bars", history.candles.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SchwabRestClient {
    http_client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl SchwabRestClient {
    /// Create a client with the default configuration
    pub fn new(tokens: Arc<dyn TokenSource>) -> RestResult<Self> {
        Self::with_config(ClientConfig::default(), tokens)
    }

    /// Create a client with custom configuration
    pub fn with_config(config: ClientConfig, tokens: Arc<dyn TokenSource>) -> RestResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_deref().unwrap_or("schwab-rest/0.1.0"))
            .build()?;

        info!("Created Schwab REST client for {}", config.base_url);

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// API host this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn context(&self) -> RequestContext<'_> {
        RequestContext {
            client: &self.http_client,
            base_url: &self.base_url,
            tokens: self.tokens.as_ref(),
        }
    }

    // ========================================================================
    // Market Data Endpoints
    // ========================================================================

    /// Get market data endpoints
    pub fn market(&self) -> MarketEndpoints<'_> {
        MarketEndpoints::new(self.context())
    }

    /// Get quotes for several symbols
    pub async fn get_quotes(&self, symbols: &[&str]) -> RestResult<QuoteResponse> {
        self.market().get_quotes(symbols).await
    }

    /// Get the quote for one symbol
    pub async fn get_quote(&self, symbol: &str) -> RestResult<QuoteEntry> {
        self.market().get_quote(symbol).await
    }

    /// Get price history
    pub async fn get_price_history(&self, request: &PriceHistoryRequest) -> RestResult<PriceHistory> {
        self.market().get_price_history(request).await
    }

    /// Get an option chain
    pub async fn get_option_chain(&self, request: &OptionChainRequest) -> RestResult<OptionChain> {
        self.market().get_option_chain(request).await
    }

    // ========================================================================
    // Trader Endpoints
    // ========================================================================

    /// Get trader endpoints
    pub fn trader(&self) -> TraderEndpoints<'_> {
        TraderEndpoints::new(self.context())
    }

    /// Get linked account numbers
    pub async fn get_linked_accounts(&self) -> RestResult<Vec<LinkedAccount>> {
        self.trader().get_linked_accounts().await
    }

    /// Get user preferences with streamer info
    pub async fn get_user_preference(&self) -> RestResult<UserPreference> {
        self.trader().get_user_preference().await
    }
}

impl std::fmt::Debug for SchwabRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchwabRestClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Custom user agent
    pub user_agent: Option<String>,
    /// API host
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
