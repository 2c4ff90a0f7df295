//! Trader API endpoints used by the dashboard

use super::RequestContext;
use crate::error::RestResult;
use crate::types::{LinkedAccount, UserPreference};
use tracing::{debug, instrument};

const TRADER_PATH: &str = "/trader/v1";

/// Account and preference endpoints
pub struct TraderEndpoints<'a> {
    ctx: RequestContext<'a>,
}

impl<'a> TraderEndpoints<'a> {
    pub fn new(ctx: RequestContext<'a>) -> Self {
        Self { ctx }
    }

    /// Account numbers linked to the authorized user
    #[instrument(skip(self))]
    pub async fn get_linked_accounts(&self) -> RestResult<Vec<LinkedAccount>> {
        debug!("Fetching linked accounts");
        self.ctx
            .get_json(&format!("{}/accounts/accountNumbers", TRADER_PATH), &[])
            .await
    }

    /// User preferences, including streamer connection info
    #[instrument(skip(self))]
    pub async fn get_user_preference(&self) -> RestResult<UserPreference> {
        debug!("Fetching user preference");
        self.ctx
            .get_json(&format!("{}/userPreference", TRADER_PATH), &[])
            .await
    }
}
