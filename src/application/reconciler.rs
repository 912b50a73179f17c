//! Reconciler
//!
//! Discovers on-chain positions not yet tracked for a (owner, market) pair
//! and persists them with an initial valuation snapshot. Idempotent: a mint
//! already in the store is never touched, so re-running against unchanged
//! chain state is a no-op.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use crate::domain::{NewPosition, PositionValue, TrackedPosition};
use crate::ports::chain::{ChainError, ChainReader};
use crate::ports::price::{PriceError, PriceOracle};
use crate::ports::store::{PositionFilter, PositionStore, StoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Price(#[from] PriceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

#[derive(Clone)]
pub struct Reconciler {
    chain: Arc<dyn ChainReader>,
    prices: Arc<dyn PriceOracle>,
    store: Arc<dyn PositionStore>,
    call_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        prices: Arc<dyn PriceOracle>,
        store: Arc<dyn PositionStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            prices,
            store,
            call_timeout,
        }
    }

    /// Sync every distinct (owner, market) pair derived from the store.
    ///
    /// A failing pair is logged and skipped; it never aborts reconciliation
    /// for the others. Returns the newly created rows.
    pub async fn reconcile_all(&self) -> Vec<TrackedPosition> {
        let positions = match self.store.find_positions(&PositionFilter::default()).await {
            Ok(positions) => positions,
            Err(e) => {
                tracing::error!("reconcile: failed to read store: {}", e);
                return Vec::new();
            }
        };

        // Dedupe by (owner, market) before touching RPC; resolve each owner's
        // wallet once.
        let mut wallets: HashMap<String, Option<String>> = HashMap::new();
        let mut combos: BTreeMap<(String, String), String> = BTreeMap::new();
        for position in &positions {
            let wallet = match wallets.get(&position.owner_id) {
                Some(wallet) => wallet.clone(),
                None => {
                    let wallet = match self.store.find_owner(&position.owner_id).await {
                        Ok(owner) => owner.and_then(|o| o.wallet),
                        Err(e) => {
                            tracing::error!("reconcile: owner lookup {} failed: {}", position.owner_id, e);
                            None
                        }
                    };
                    wallets.insert(position.owner_id.clone(), wallet.clone());
                    wallet
                }
            };

            let Some(wallet) = wallet else {
                tracing::debug!("reconcile: owner {} has no wallet, skipping", position.owner_id);
                continue;
            };
            combos
                .entry((position.owner_id.clone(), position.market.clone()))
                .or_insert(wallet);
        }

        let mut created = Vec::new();
        for ((owner_id, market), wallet) in combos {
            match self.sync_pair(&owner_id, &wallet, &market).await {
                Ok(mut rows) => created.append(&mut rows),
                Err(e) => {
                    tracing::error!(
                        "reconcile: sync failed for owner {} market {}: {}",
                        owner_id,
                        market,
                        e
                    );
                }
            }
        }

        if !created.is_empty() {
            tracing::info!("reconcile: synced {} new positions", created.len());
        }
        created
    }

    /// Sync a single (owner, wallet, market) combination.
    pub async fn sync_pair(
        &self,
        owner_id: &str,
        wallet: &str,
        market: &str,
    ) -> Result<Vec<TrackedPosition>, ReconcileError> {
        let onchain = timeout(
            self.call_timeout,
            self.chain.get_user_positions(wallet, market),
        )
        .await
        .map_err(|_| ReconcileError::Timeout("get_user_positions"))??;

        if onchain.is_empty() {
            return Ok(Vec::new());
        }

        let existing: HashSet<String> = self
            .store
            .find_positions(&PositionFilter::owner_market(owner_id, market))
            .await?
            .into_iter()
            .map(|p| p.mint)
            .collect();

        let unknown: Vec<_> = onchain
            .into_iter()
            .filter(|p| !existing.contains(&p.mint))
            .collect();
        if unknown.is_empty() {
            return Ok(Vec::new());
        }

        // Pair metadata and prices are fetched once per combo and reused for
        // every new mint in it.
        let pair = timeout(self.call_timeout, self.chain.get_pair(market))
            .await
            .map_err(|_| ReconcileError::Timeout("get_pair"))??;

        let decimals = timeout(self.call_timeout, self.chain.get_pool_decimals(market))
            .await
            .map_err(|_| ReconcileError::Timeout("get_pool_decimals"))??;

        let price_map = timeout(
            self.call_timeout,
            self.prices
                .get_usd_prices(&[pair.token_mint_x.clone(), pair.token_mint_y.clone()]),
        )
        .await
        .map_err(|_| ReconcileError::Timeout("get_usd_prices"))??;

        let price_x = price_map.get(&pair.token_mint_x).copied().unwrap_or(0.0);
        let price_y = price_map.get(&pair.token_mint_y).copied().unwrap_or(0.0);

        let mut created = Vec::new();
        for ocp in unknown {
            let reserves = timeout(
                self.call_timeout,
                self.chain.get_reserves(&ocp.account, market, wallet),
            )
            .await
            .map_err(|_| ReconcileError::Timeout("get_reserves"))??;

            let (raw_x, raw_y) = reserves.iter().fold((0u128, 0u128), |(x, y), bin| {
                (x + bin.reserve_x as u128, y + bin.reserve_y as u128)
            });

            let snapshot = PositionValue::from_raw(
                raw_x,
                raw_y,
                decimals.decimals_x,
                decimals.decimals_y,
                price_x,
                price_y,
            );

            let data = NewPosition {
                owner_id: owner_id.to_string(),
                mint: ocp.mint.clone(),
                market: market.to_string(),
                lower_bin_id: ocp.lower_bin_id,
                upper_bin_id: ocp.upper_bin_id,
                last_valuation_usd: snapshot.usd_value,
                initial_token_a_amount: snapshot.token_x_amount,
                initial_token_b_amount: snapshot.token_y_amount,
                initial_token_a_price_usd: snapshot.token_x_price_usd,
                initial_token_b_price_usd: snapshot.token_y_price_usd,
            };

            match self.store.create_position(data).await {
                Ok(position) => {
                    tracing::info!(
                        "reconcile: synced position {} for owner {} in market {}",
                        position.mint,
                        owner_id,
                        market
                    );
                    created.push(position);
                }
                // A concurrent writer got there first; the row exists, done.
                Err(StoreError::Duplicate { .. }) => continue,
                Err(e) => {
                    tracing::error!("reconcile: failed to persist {}: {}", ocp.mint, e);
                }
            }
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::JsonPositionStore;
    use crate::domain::OwnerProfile;
    use crate::ports::chain::{BinReserves, OnChainPosition};
    use crate::ports::mocks::{MockChainReader, MockPriceOracle};
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    const WALLET: &str = "Wallet111111111111111111111111111111111111";
    const MARKET: &str = "Market111111111111111111111111111111111111";

    fn onchain(mint: &str, account: &str) -> OnChainPosition {
        OnChainPosition {
            mint: mint.to_string(),
            account: account.to_string(),
            lower_bin_id: 50,
            upper_bin_id: 60,
        }
    }

    async fn seeded_store(dir: &std::path::Path) -> Arc<JsonPositionStore> {
        let store = Arc::new(JsonPositionStore::open(dir).unwrap());
        store
            .upsert_owner(OwnerProfile {
                id: "user-1".to_string(),
                chat_id: "chat-1".to_string(),
                wallet: Some(WALLET.to_string()),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_sync_pair_creates_snapshot_row() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        let chain = MockChainReader::new()
            .with_pair(MARKET, "mintX", "mintY", 55)
            .with_decimals(MARKET, 2, 0)
            .with_positions(WALLET, MARKET, vec![onchain("new-mint", "acct-1")])
            .with_reserves("acct-1", vec![BinReserves { reserve_x: 1000, reserve_y: 4 }]);
        let prices = MockPriceOracle::new()
            .with_price("mintX", 2.0)
            .with_price("mintY", 10.0);

        let reconciler = Reconciler::new(
            Arc::new(chain),
            Arc::new(prices),
            store.clone(),
            Duration::from_secs(5),
        );

        let created = reconciler
            .sync_pair("user-1", WALLET, MARKET)
            .await
            .unwrap();
        assert_eq!(created.len(), 1);

        let row = &created[0];
        assert_eq!(row.mint, "new-mint");
        assert_eq!(row.lower_bin_id, 50);
        assert_eq!(row.upper_bin_id, 60);
        // 1000 raw at 2 decimals = 10 tokens at $2, plus 4 at $10.
        assert_relative_eq!(row.last_valuation_usd, 60.0);
        assert_relative_eq!(row.initial_token_a_amount, 10.0);
        assert_relative_eq!(row.initial_token_b_amount, 4.0);
        assert_relative_eq!(row.initial_token_a_price_usd, 2.0);
        assert_relative_eq!(row.initial_token_b_price_usd, 10.0);
        assert_eq!(row.last_il_warning_percent, 0.0);
    }

    #[tokio::test]
    async fn test_sync_pair_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        let chain = MockChainReader::new()
            .with_pair(MARKET, "mintX", "mintY", 55)
            .with_decimals(MARKET, 0, 0)
            .with_positions(WALLET, MARKET, vec![onchain("new-mint", "acct-1")])
            .with_reserves("acct-1", vec![BinReserves { reserve_x: 1, reserve_y: 1 }]);
        let prices = MockPriceOracle::new().with_price("mintX", 1.0);

        let reconciler = Reconciler::new(
            Arc::new(chain),
            Arc::new(prices),
            store.clone(),
            Duration::from_secs(5),
        );

        let first = reconciler.sync_pair("user-1", WALLET, MARKET).await.unwrap();
        let second = reconciler.sync_pair("user-1", WALLET, MARKET).await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(store.position_count().await, 1);
    }

    #[tokio::test]
    async fn test_reconcile_all_isolates_failing_market() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        const BAD_MARKET: &str = "BadMarket1111111111111111111111111111111111";

        // Two tracked rows derive two combos; one market's RPC fails.
        for (mint, market) in [("m1", MARKET), ("m2", BAD_MARKET)] {
            store
                .create_position(NewPosition {
                    owner_id: "user-1".to_string(),
                    mint: mint.to_string(),
                    market: market.to_string(),
                    lower_bin_id: 0,
                    upper_bin_id: 10,
                    last_valuation_usd: 1.0,
                    initial_token_a_amount: 1.0,
                    initial_token_b_amount: 0.0,
                    initial_token_a_price_usd: 1.0,
                    initial_token_b_price_usd: 0.0,
                })
                .await
                .unwrap();
        }

        let chain = MockChainReader::new()
            .with_pair(MARKET, "mintX", "mintY", 5)
            .with_decimals(MARKET, 0, 0)
            .with_positions(
                WALLET,
                MARKET,
                vec![onchain("m1", "acct-1"), onchain("m3", "acct-3")],
            )
            .with_reserves("acct-1", vec![])
            .with_reserves("acct-3", vec![BinReserves { reserve_x: 7, reserve_y: 0 }])
            .with_failing_market(BAD_MARKET);
        let prices = MockPriceOracle::new().with_price("mintX", 1.0);

        let reconciler = Reconciler::new(
            Arc::new(chain),
            Arc::new(prices),
            store.clone(),
            Duration::from_secs(5),
        );

        let created = reconciler.reconcile_all().await;

        // The healthy market still syncs its unknown mint.
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].mint, "m3");
        assert_relative_eq!(created[0].last_valuation_usd, 7.0);
    }

    #[tokio::test]
    async fn test_reconcile_all_skips_owner_without_wallet() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonPositionStore::open(dir.path()).unwrap());
        store
            .upsert_owner(OwnerProfile {
                id: "user-1".to_string(),
                chat_id: "chat-1".to_string(),
                wallet: None,
            })
            .await
            .unwrap();
        store
            .create_position(NewPosition {
                owner_id: "user-1".to_string(),
                mint: "m1".to_string(),
                market: MARKET.to_string(),
                lower_bin_id: 0,
                upper_bin_id: 1,
                last_valuation_usd: 0.0,
                initial_token_a_amount: 0.0,
                initial_token_b_amount: 0.0,
                initial_token_a_price_usd: 0.0,
                initial_token_b_price_usd: 0.0,
            })
            .await
            .unwrap();

        let chain = MockChainReader::new();
        let reconciler = Reconciler::new(
            Arc::new(chain),
            Arc::new(MockPriceOracle::new()),
            store.clone(),
            Duration::from_secs(5),
        );

        let created = reconciler.reconcile_all().await;
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn test_missing_price_snapshots_zero_leg() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        let chain = MockChainReader::new()
            .with_pair(MARKET, "mintX", "mintY", 55)
            .with_decimals(MARKET, 0, 0)
            .with_positions(WALLET, MARKET, vec![onchain("new-mint", "acct-1")])
            .with_reserves("acct-1", vec![BinReserves { reserve_x: 10, reserve_y: 20 }]);
        // Only mintX is priced; the Y leg snapshots at zero.
        let prices = MockPriceOracle::new().with_price("mintX", 3.0);

        let reconciler = Reconciler::new(
            Arc::new(chain),
            Arc::new(prices),
            store.clone(),
            Duration::from_secs(5),
        );

        let created = reconciler.sync_pair("user-1", WALLET, MARKET).await.unwrap();
        assert_relative_eq!(created[0].last_valuation_usd, 30.0);
        assert_relative_eq!(created[0].initial_token_b_price_usd, 0.0);
        assert_relative_eq!(created[0].initial_token_b_amount, 20.0);
    }
}
