//! API endpoint implementations

pub mod market;
pub mod trader;

pub use market::MarketEndpoints;
pub use trader::TraderEndpoints;

use crate::error::{RestError, RestResult};
use crate::token_source::TokenSource;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Shared pieces every endpoint group needs to issue a request
#[derive(Clone, Copy)]
pub struct RequestContext<'a> {
    pub client: &'a Client,
    pub base_url: &'a str,
    pub tokens: &'a dyn TokenSource,
}

impl<'a> RequestContext<'a> {
    /// Authenticated GET returning a JSON body
    ///
    /// A 401 triggers one token refresh and one more attempt.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RestResult<T> {
        let token = self.tokens.access_token().await?;
        let body = match self.send_get(path, query, &token).await {
            Err(e) if e.is_unauthorized() => {
                warn!("Access token rejected for {}, refreshing and retrying", path);
                let token = self.tokens.refresh_token(&token).await?;
                self.send_get(path, query, &token).await?
            }
            other => other?,
        };

        serde_json::from_str(&body).map_err(|e| RestError::Parse(format!("{} ({})", e, path)))
    }

    async fn send_get(&self, path: &str, query: &[(&str, String)], token: &str) -> RestResult<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RestError::from_response(status.as_u16(), &body));
        }
        Ok(body)
    }
}
