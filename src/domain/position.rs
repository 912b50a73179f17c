use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monitoring state of a tracked position. Exited positions are kept in the
/// store but excluded from the monitor cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Active,
    Exited,
}

/// A liquidity-book position under monitoring.
///
/// `(owner_id, market, mint)` uniquely identifies a row. The bin range is
/// immutable after creation; a changed range is a new position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedPosition {
    /// Store-assigned identifier
    pub id: u64,
    /// Owning user (resolved to wallet + chat via OwnerProfile)
    pub owner_id: String,
    /// On-chain position mint address
    pub mint: String,
    /// Pool/pair address this position belongs to
    pub market: String,
    /// Lower bound of the active bin range
    pub lower_bin_id: i32,
    /// Upper bound of the active bin range
    pub upper_bin_id: i32,
    /// Most recent computed total USD value; 0 until first valuation
    pub last_valuation_usd: f64,
    /// Token quantities captured at creation time (decimal-adjusted)
    pub initial_token_a_amount: f64,
    pub initial_token_b_amount: f64,
    /// USD prices captured at creation time
    pub initial_token_a_price_usd: f64,
    pub initial_token_b_price_usd: f64,
    /// Signed percentage of the last notified IL level; 0 means no active warning
    pub last_il_warning_percent: f64,
    pub status: PositionStatus,
    pub created_at: DateTime<Utc>,
}

impl TrackedPosition {
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    /// Whether the pool's active bin falls inside this position's range.
    pub fn is_in_range(&self, active_bin: i32) -> bool {
        active_bin >= self.lower_bin_id && active_bin <= self.upper_bin_id
    }

    /// Whether an initial holdings snapshot was captured at creation.
    pub fn has_initial_snapshot(&self) -> bool {
        self.initial_token_a_amount > 0.0 || self.initial_token_b_amount > 0.0
    }
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("invalid bin range: lower {lower} > upper {upper}")]
    InvalidBinRange { lower: i32, upper: i32 },
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Creation payload for a new tracked position.
///
/// `last_valuation_usd` and the `initial_*` fields come from the same
/// valuation snapshot; `last_il_warning_percent` always starts at 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPosition {
    pub owner_id: String,
    pub mint: String,
    pub market: String,
    pub lower_bin_id: i32,
    pub upper_bin_id: i32,
    pub last_valuation_usd: f64,
    pub initial_token_a_amount: f64,
    pub initial_token_b_amount: f64,
    pub initial_token_a_price_usd: f64,
    pub initial_token_b_price_usd: f64,
}

impl NewPosition {
    pub fn validate(&self) -> Result<(), PositionError> {
        if self.owner_id.is_empty() {
            return Err(PositionError::MissingField("owner_id"));
        }
        if self.mint.is_empty() {
            return Err(PositionError::MissingField("mint"));
        }
        if self.market.is_empty() {
            return Err(PositionError::MissingField("market"));
        }
        if self.lower_bin_id > self.upper_bin_id {
            return Err(PositionError::InvalidBinRange {
                lower: self.lower_bin_id,
                upper: self.upper_bin_id,
            });
        }
        Ok(())
    }
}

/// Registered user record the monitor resolves owner ids against.
///
/// Registration itself happens in the bot layer; the monitor only reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub id: String,
    /// External notification channel (Telegram chat id)
    pub chat_id: String,
    /// Wallet public key; positions of owners without one cannot be reconciled
    pub wallet: Option<String>,
}
