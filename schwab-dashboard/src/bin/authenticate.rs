//! Authorize the app and save tokens
//!
//! Run with: cargo run -p schwab-dashboard --bin authenticate
//!
//! Prints the authorization URL, reads the URL the browser was redirected
//! to from stdin and exchanges its code for tokens. Then lists the linked
//! account numbers to confirm access.

use anyhow::{bail, Context, Result};
use schwab_auth::TokenProvider;
use schwab_rest::SchwabRestClient;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Schwab API authentication");
    let provider = TokenProvider::from_env().context("missing Schwab app credentials")?;

    if provider.check_authentication().await {
        info!("Saved tokens are still valid");
    } else {
        println!("Open this URL in a browser and log in:\n");
        println!("  {}\n", provider.authorization_url()?);
        print!("Paste the URL you were redirected to: ");
        io::stdout().flush()?;

        let mut redirect = String::new();
        io::stdin().lock().read_line(&mut redirect)?;
        let code = TokenProvider::code_from_redirect(&redirect)?;
        provider.exchange_code(&code).await?;
        info!("Tokens saved");
    }

    if !provider.check_authentication().await {
        error!("Failed to authenticate with Schwab API");
        bail!("not authenticated");
    }
    info!("Successfully authenticated with Schwab API");

    let rest = SchwabRestClient::new(Arc::new(provider))?;
    let accounts = rest.get_linked_accounts().await?;
    info!("Found {} linked accounts", accounts.len());
    for account in &accounts {
        info!("Account Number: {}", account.account_number);
    }
    Ok(())
}
