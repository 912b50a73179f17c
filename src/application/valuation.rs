//! Valuation Engine
//!
//! Computes a tracked position's current token composition and USD value:
//! re-resolves the stored mint to its current on-chain account, sums
//! per-bin reserves, applies pool decimals, and prices both legs.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use crate::domain::PositionValue;
use crate::domain::TrackedPosition;
use crate::ports::chain::{ChainError, ChainReader};
use crate::ports::price::{PriceError, PriceOracle};

#[derive(Debug, Error)]
pub enum ValuationError {
    /// The stored mint is not among the wallet's current on-chain positions
    /// (withdrawn, or transient RPC lag). Non-fatal: the position is skipped,
    /// never deleted.
    #[error("position {0} not found among wallet positions")]
    PositionNotFound(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Price(#[from] PriceError),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

#[derive(Clone)]
pub struct ValuationEngine {
    chain: Arc<dyn ChainReader>,
    prices: Arc<dyn PriceOracle>,
    call_timeout: Duration,
}

impl ValuationEngine {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        prices: Arc<dyn PriceOracle>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            prices,
            call_timeout,
        }
    }

    /// Value one tracked position for the owner's wallet.
    pub async fn value(
        &self,
        wallet: &str,
        position: &TrackedPosition,
    ) -> Result<PositionValue, ValuationError> {
        let onchain = timeout(
            self.call_timeout,
            self.chain.get_user_positions(wallet, &position.market),
        )
        .await
        .map_err(|_| ValuationError::Timeout("get_user_positions"))??;

        // The account address is not stable across reads; match by mint.
        let matched = onchain
            .into_iter()
            .find(|p| p.mint == position.mint)
            .ok_or_else(|| ValuationError::PositionNotFound(position.mint.clone()))?;

        let reserves = timeout(
            self.call_timeout,
            self.chain
                .get_reserves(&matched.account, &position.market, wallet),
        )
        .await
        .map_err(|_| ValuationError::Timeout("get_reserves"))??;

        let (raw_x, raw_y) = reserves.iter().fold((0u128, 0u128), |(x, y), bin| {
            (x + bin.reserve_x as u128, y + bin.reserve_y as u128)
        });

        let pair = timeout(self.call_timeout, self.chain.get_pair(&position.market))
            .await
            .map_err(|_| ValuationError::Timeout("get_pair"))??;

        let decimals = timeout(
            self.call_timeout,
            self.chain.get_pool_decimals(&position.market),
        )
        .await
        .map_err(|_| ValuationError::Timeout("get_pool_decimals"))??;

        let price_map = timeout(
            self.call_timeout,
            self.prices
                .get_usd_prices(&[pair.token_mint_x.clone(), pair.token_mint_y.clone()]),
        )
        .await
        .map_err(|_| ValuationError::Timeout("get_usd_prices"))??;

        // A mint the oracle cannot price values at zero, never errors.
        let price_x = price_map.get(&pair.token_mint_x).copied().unwrap_or(0.0);
        let price_y = price_map.get(&pair.token_mint_y).copied().unwrap_or(0.0);

        Ok(PositionValue::from_raw(
            raw_x,
            raw_y,
            decimals.decimals_x,
            decimals.decimals_y,
            price_x,
            price_y,
        ))
    }
}
