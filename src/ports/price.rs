use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Price lookup error type. An unknown mint is NOT an error: the oracle
/// returns no entry for it and callers price that leg at zero.
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Price API returned status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Best-effort spot USD price source.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Fetch USD prices for a batch of mints. Mints the oracle does not know
    /// are simply absent from the result map.
    async fn get_usd_prices(&self, mints: &[String]) -> Result<HashMap<String, f64>, PriceError>;

    /// Single-mint convenience; `Ok(None)` when the oracle has no price.
    async fn get_usd_price(&self, mint: &str) -> Result<Option<f64>, PriceError> {
        let prices = self.get_usd_prices(&[mint.to_string()]).await?;
        Ok(prices.get(mint).copied())
    }
}
