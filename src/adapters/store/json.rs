//! JSON-file position store
//!
//! Persists the tracked-position table and the owner registry as pretty
//! JSON files under a data directory. State is held in memory behind an
//! async RwLock; every mutation is written through a temp file and an
//! atomic rename, so a crash mid-write never corrupts the table.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::{NewPosition, OwnerProfile, PositionStatus, TrackedPosition};
use crate::ports::store::{PositionFilter, PositionStore, PositionUpdate, StoreError};

pub const POSITIONS_FILE: &str = "positions.json";
pub const OWNERS_FILE: &str = "owners.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PositionsFile {
    next_id: u64,
    positions: Vec<TrackedPosition>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    positions: Vec<TrackedPosition>,
    owners: Vec<OwnerProfile>,
}

pub struct JsonPositionStore {
    data_dir: PathBuf,
    inner: RwLock<Inner>,
}

impl JsonPositionStore {
    /// Open a store rooted at `data_dir`, loading any existing tables.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|e| StoreError::Io(e.to_string()))?;

        let positions_path = data_dir.join(POSITIONS_FILE);
        let (next_id, positions) = if positions_path.exists() {
            let file: PositionsFile = read_json(&positions_path)?;
            // Guard against a stale counter in a hand-edited file.
            let max_id = file.positions.iter().map(|p| p.id).max().unwrap_or(0);
            (file.next_id.max(max_id + 1), file.positions)
        } else {
            (1, Vec::new())
        };

        let owners_path = data_dir.join(OWNERS_FILE);
        let owners: Vec<OwnerProfile> = if owners_path.exists() {
            read_json(&owners_path)?
        } else {
            Vec::new()
        };

        tracing::debug!(
            "position store opened: {} positions, {} owners",
            positions.len(),
            owners.len()
        );

        Ok(Self {
            data_dir,
            inner: RwLock::new(Inner {
                next_id,
                positions,
                owners,
            }),
        })
    }

    /// Register or replace an owner profile. Owner registration belongs to
    /// the bot layer; this exists for seeding and tests.
    pub async fn upsert_owner(&self, owner: OwnerProfile) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.owners.iter_mut().find(|o| o.id == owner.id) {
            Some(existing) => *existing = owner,
            None => inner.owners.push(owner),
        }
        write_json(&self.data_dir.join(OWNERS_FILE), &inner.owners)
    }

    pub async fn position_count(&self) -> usize {
        self.inner.read().await.positions.len()
    }

    fn persist_positions(&self, inner: &Inner) -> Result<(), StoreError> {
        let file = PositionsFile {
            next_id: inner.next_id,
            positions: inner.positions.clone(),
        };
        write_json(&self.data_dir.join(POSITIONS_FILE), &file)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| StoreError::Io(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::Io(e.to_string()))
}

#[async_trait]
impl PositionStore for JsonPositionStore {
    async fn find_positions(
        &self,
        filter: &PositionFilter,
    ) -> Result<Vec<TrackedPosition>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .positions
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn find_owner(&self, owner_id: &str) -> Result<Option<OwnerProfile>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.owners.iter().find(|o| o.id == owner_id).cloned())
    }

    async fn create_position(&self, data: NewPosition) -> Result<TrackedPosition, StoreError> {
        data.validate()?;

        let mut inner = self.inner.write().await;

        let duplicate = inner.positions.iter().any(|p| {
            p.owner_id == data.owner_id && p.market == data.market && p.mint == data.mint
        });
        if duplicate {
            return Err(StoreError::Duplicate {
                owner_id: data.owner_id,
                market: data.market,
                mint: data.mint,
            });
        }

        let position = TrackedPosition {
            id: inner.next_id,
            owner_id: data.owner_id,
            mint: data.mint,
            market: data.market,
            lower_bin_id: data.lower_bin_id,
            upper_bin_id: data.upper_bin_id,
            last_valuation_usd: data.last_valuation_usd,
            initial_token_a_amount: data.initial_token_a_amount,
            initial_token_b_amount: data.initial_token_b_amount,
            initial_token_a_price_usd: data.initial_token_a_price_usd,
            initial_token_b_price_usd: data.initial_token_b_price_usd,
            last_il_warning_percent: 0.0,
            status: PositionStatus::Active,
            created_at: Utc::now(),
        };

        inner.next_id += 1;
        inner.positions.push(position.clone());
        self.persist_positions(&inner)?;

        Ok(position)
    }

    async fn update_position(&self, id: u64, update: PositionUpdate) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let position = inner
            .positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::RowNotFound(id))?;

        if let Some(value) = update.last_valuation_usd {
            position.last_valuation_usd = value;
        }
        if let Some(value) = update.last_il_warning_percent {
            position.last_il_warning_percent = value;
        }
        if let Some(status) = update.status {
            position.status = status;
        }

        self.persist_positions(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_position(owner: &str, mint: &str) -> NewPosition {
        NewPosition {
            owner_id: owner.to_string(),
            mint: mint.to_string(),
            market: "Market111111111111111111111111111111111111".to_string(),
            lower_bin_id: 100,
            upper_bin_id: 120,
            last_valuation_usd: 250.0,
            initial_token_a_amount: 10.0,
            initial_token_b_amount: 5.0,
            initial_token_a_price_usd: 20.0,
            initial_token_b_price_usd: 10.0,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let dir = tempdir().unwrap();
        let store = JsonPositionStore::open(dir.path()).unwrap();

        let created = store.create_position(new_position("u1", "m1")).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.last_il_warning_percent, 0.0);
        assert_eq!(created.status, PositionStatus::Active);

        let all = store.find_positions(&PositionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);

        let by_owner = store
            .find_positions(&PositionFilter::owner_market("u1", &created.market))
            .await
            .unwrap();
        assert_eq!(by_owner.len(), 1);

        let other_owner = store
            .find_positions(&PositionFilter::owner_market("u2", &created.market))
            .await
            .unwrap();
        assert!(other_owner.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let dir = tempdir().unwrap();
        let store = JsonPositionStore::open(dir.path()).unwrap();

        store.create_position(new_position("u1", "m1")).await.unwrap();
        let result = store.create_position(new_position("u1", "m1")).await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));

        // Same mint for another owner is a distinct row.
        store.create_position(new_position("u2", "m1")).await.unwrap();
        assert_eq!(store.position_count().await, 2);
    }

    #[tokio::test]
    async fn test_update_is_row_scoped() {
        let dir = tempdir().unwrap();
        let store = JsonPositionStore::open(dir.path()).unwrap();

        let first = store.create_position(new_position("u1", "m1")).await.unwrap();
        let second = store.create_position(new_position("u1", "m2")).await.unwrap();

        store
            .update_position(
                first.id,
                PositionUpdate {
                    last_valuation_usd: Some(300.0),
                    last_il_warning_percent: Some(-6.5),
                    status: None,
                },
            )
            .await
            .unwrap();

        let rows = store.find_positions(&PositionFilter::default()).await.unwrap();
        let updated = rows.iter().find(|p| p.id == first.id).unwrap();
        let untouched = rows.iter().find(|p| p.id == second.id).unwrap();

        assert_eq!(updated.last_valuation_usd, 300.0);
        assert_eq!(updated.last_il_warning_percent, -6.5);
        assert_eq!(untouched.last_valuation_usd, 250.0);
        assert_eq!(untouched.last_il_warning_percent, 0.0);
    }

    #[tokio::test]
    async fn test_update_unknown_row() {
        let dir = tempdir().unwrap();
        let store = JsonPositionStore::open(dir.path()).unwrap();
        let result = store.update_position(42, PositionUpdate::default()).await;
        assert!(matches!(result, Err(StoreError::RowNotFound(42))));
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = JsonPositionStore::open(dir.path()).unwrap();
            store.create_position(new_position("u1", "m1")).await.unwrap();
            store
                .upsert_owner(OwnerProfile {
                    id: "u1".to_string(),
                    chat_id: "chat-1".to_string(),
                    wallet: Some("Wallet111111111111111111111111111111111111".to_string()),
                })
                .await
                .unwrap();
        }

        let reopened = JsonPositionStore::open(dir.path()).unwrap();
        assert_eq!(reopened.position_count().await, 1);

        let owner = reopened.find_owner("u1").await.unwrap().unwrap();
        assert_eq!(owner.chat_id, "chat-1");

        // Ids keep increasing after a restart.
        let next = reopened.create_position(new_position("u1", "m2")).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn test_status_filter() {
        let dir = tempdir().unwrap();
        let store = JsonPositionStore::open(dir.path()).unwrap();

        let row = store.create_position(new_position("u1", "m1")).await.unwrap();
        store
            .update_position(
                row.id,
                PositionUpdate {
                    status: Some(PositionStatus::Exited),
                    ..PositionUpdate::default()
                },
            )
            .await
            .unwrap();

        let active = store.find_positions(&PositionFilter::active()).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_data_rejected() {
        let dir = tempdir().unwrap();
        let store = JsonPositionStore::open(dir.path()).unwrap();

        let mut data = new_position("u1", "m1");
        data.lower_bin_id = 200;
        let result = store.create_position(data).await;
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
        assert_eq!(store.position_count().await, 0);
    }
}
