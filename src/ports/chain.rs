use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chain read error type
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Failed to decode account {0}: {1}")]
    Decode(String, String),

    #[error("Invalid address for {0}: {1}")]
    InvalidAddress(&'static str, String),
}

/// Pair-level metadata for a liquidity-book pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairInfo {
    pub token_mint_x: String,
    pub token_mint_y: String,
    /// Bin currently containing the market price
    pub active_bin: i32,
}

/// Token decimal exponents for a pool. Pool-level, never per-bin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolDecimals {
    pub decimals_x: u8,
    pub decimals_y: u8,
}

/// A position as it exists on-chain right now.
///
/// The account address is not assumed stable across reads; the stored mint
/// is re-resolved against this list every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnChainPosition {
    /// Position mint, the stable identity of the position
    pub mint: String,
    /// Current position account address
    pub account: String,
    pub lower_bin_id: i32,
    pub upper_bin_id: i32,
}

/// Token balances held by a position within a single bin.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BinReserves {
    pub reserve_x: u64,
    pub reserve_y: u64,
}

/// Read-only view of the liquidity-book program state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Fetch pair metadata, including the active bin.
    async fn get_pair(&self, market: &str) -> Result<PairInfo, ChainError>;

    /// Bin currently containing the pool's market price.
    async fn get_active_bin(&self, market: &str) -> Result<i32, ChainError> {
        Ok(self.get_pair(market).await?.active_bin)
    }

    /// All positions the wallet currently holds in the given pool.
    async fn get_user_positions(
        &self,
        wallet: &str,
        market: &str,
    ) -> Result<Vec<OnChainPosition>, ChainError>;

    /// Per-bin reserve balances for one position account.
    async fn get_reserves(
        &self,
        position_account: &str,
        market: &str,
        wallet: &str,
    ) -> Result<Vec<BinReserves>, ChainError>;

    /// Token decimal exponents for the pool's two mints.
    async fn get_pool_decimals(&self, market: &str) -> Result<PoolDecimals, ChainError>;
}
