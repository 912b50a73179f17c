use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{NewPosition, OwnerProfile, PositionStatus, TrackedPosition};

/// Store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("position already tracked: owner {owner_id}, market {market}, mint {mint}")]
    Duplicate {
        owner_id: String,
        market: String,
        mint: String,
    },

    #[error("no position with id {0}")]
    RowNotFound(u64),

    #[error("invalid position data: {0}")]
    InvalidData(#[from] crate::domain::PositionError),

    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Row filter for position lookups. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PositionFilter {
    pub owner_id: Option<String>,
    pub market: Option<String>,
    pub mint: Option<String>,
    pub status: Option<PositionStatus>,
}

impl PositionFilter {
    /// All rows the monitor cycle cares about.
    pub fn active() -> Self {
        Self {
            status: Some(PositionStatus::Active),
            ..Self::default()
        }
    }

    /// Rows for one (owner, market) pair, any status.
    pub fn owner_market(owner_id: &str, market: &str) -> Self {
        Self {
            owner_id: Some(owner_id.to_string()),
            market: Some(market.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, position: &TrackedPosition) -> bool {
        if let Some(ref owner_id) = self.owner_id {
            if &position.owner_id != owner_id {
                return false;
            }
        }
        if let Some(ref market) = self.market {
            if &position.market != market {
                return false;
            }
        }
        if let Some(ref mint) = self.mint {
            if &position.mint != mint {
                return false;
            }
        }
        if let Some(status) = self.status {
            if position.status != status {
                return false;
            }
        }
        true
    }
}

/// Field update for a single row. `None` leaves the field untouched.
/// Baseline fields are only ever replaced, never accumulated.
#[derive(Debug, Clone, Default)]
pub struct PositionUpdate {
    pub last_valuation_usd: Option<f64>,
    pub last_il_warning_percent: Option<f64>,
    pub status: Option<PositionStatus>,
}

/// Persisted table of tracked positions and their owners.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn find_positions(
        &self,
        filter: &PositionFilter,
    ) -> Result<Vec<TrackedPosition>, StoreError>;

    async fn find_owner(&self, owner_id: &str) -> Result<Option<OwnerProfile>, StoreError>;

    /// Insert a new row. Fails with `Duplicate` when `(owner, market, mint)`
    /// already exists; callers rely on this for idempotent reconciliation.
    async fn create_position(&self, data: NewPosition) -> Result<TrackedPosition, StoreError>;

    /// Row-scoped field update by id.
    async fn update_position(&self, id: u64, update: PositionUpdate) -> Result<(), StoreError>;
}
