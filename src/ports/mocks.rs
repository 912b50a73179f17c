//! Recording mocks for the port traits, used by unit and integration tests.
//! Each mock records calls and serves controlled responses set up through
//! builder methods; failure injection flips whole markets or the entire
//! endpoint into an error state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::chain::{BinReserves, ChainError, ChainReader, OnChainPosition, PairInfo, PoolDecimals};
use super::notify::{Notifier, NotifyError};
use super::price::{PriceError, PriceOracle};

/// Mock chain reader with per-market fixtures and failure injection.
#[derive(Debug, Default)]
pub struct MockChainReader {
    pairs: Mutex<HashMap<String, PairInfo>>,
    decimals: Mutex<HashMap<String, PoolDecimals>>,
    positions: Mutex<HashMap<(String, String), Vec<OnChainPosition>>>,
    reserves: Mutex<HashMap<String, Vec<BinReserves>>>,
    failing_markets: Mutex<HashSet<String>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(self, market: &str, token_mint_x: &str, token_mint_y: &str, active_bin: i32) -> Self {
        self.pairs.lock().unwrap().insert(
            market.to_string(),
            PairInfo {
                token_mint_x: token_mint_x.to_string(),
                token_mint_y: token_mint_y.to_string(),
                active_bin,
            },
        );
        self
    }

    pub fn with_decimals(self, market: &str, decimals_x: u8, decimals_y: u8) -> Self {
        self.decimals.lock().unwrap().insert(
            market.to_string(),
            PoolDecimals { decimals_x, decimals_y },
        );
        self
    }

    pub fn with_positions(self, wallet: &str, market: &str, positions: Vec<OnChainPosition>) -> Self {
        self.positions
            .lock()
            .unwrap()
            .insert((wallet.to_string(), market.to_string()), positions);
        self
    }

    pub fn with_reserves(self, position_account: &str, reserves: Vec<BinReserves>) -> Self {
        self.reserves
            .lock()
            .unwrap()
            .insert(position_account.to_string(), reserves);
        self
    }

    /// Every call touching this market fails with an RPC error.
    pub fn with_failing_market(self, market: &str) -> Self {
        self.failing_markets.lock().unwrap().insert(market.to_string());
        self
    }

    /// Mutators for multi-cycle tests.
    pub fn set_active_bin(&self, market: &str, active_bin: i32) {
        if let Some(pair) = self.pairs.lock().unwrap().get_mut(market) {
            pair.active_bin = active_bin;
        }
    }

    pub fn set_reserves(&self, position_account: &str, reserves: Vec<BinReserves>) {
        self.reserves
            .lock()
            .unwrap()
            .insert(position_account.to_string(), reserves);
    }

    pub fn set_positions(&self, wallet: &str, market: &str, positions: Vec<OnChainPosition>) {
        self.positions
            .lock()
            .unwrap()
            .insert((wallet.to_string(), market.to_string()), positions);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, market: &str) -> Result<(), ChainError> {
        if self.failing_markets.lock().unwrap().contains(market) {
            Err(ChainError::Rpc(format!("injected failure for {}", market)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn get_pair(&self, market: &str) -> Result<PairInfo, ChainError> {
        self.record(format!("get_pair:{}", market));
        self.check_failure(market)?;
        self.pairs
            .lock()
            .unwrap()
            .get(market)
            .cloned()
            .ok_or_else(|| ChainError::AccountNotFound(market.to_string()))
    }

    async fn get_user_positions(
        &self,
        wallet: &str,
        market: &str,
    ) -> Result<Vec<OnChainPosition>, ChainError> {
        self.record(format!("get_user_positions:{}:{}", wallet, market));
        self.check_failure(market)?;
        Ok(self
            .positions
            .lock()
            .unwrap()
            .get(&(wallet.to_string(), market.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_reserves(
        &self,
        position_account: &str,
        market: &str,
        _wallet: &str,
    ) -> Result<Vec<BinReserves>, ChainError> {
        self.record(format!("get_reserves:{}", position_account));
        self.check_failure(market)?;
        self.reserves
            .lock()
            .unwrap()
            .get(position_account)
            .cloned()
            .ok_or_else(|| ChainError::AccountNotFound(position_account.to_string()))
    }

    async fn get_pool_decimals(&self, market: &str) -> Result<PoolDecimals, ChainError> {
        self.record(format!("get_pool_decimals:{}", market));
        self.check_failure(market)?;
        self.decimals
            .lock()
            .unwrap()
            .get(market)
            .copied()
            .ok_or_else(|| ChainError::AccountNotFound(market.to_string()))
    }
}

/// Mock price oracle with a fixed price table.
#[derive(Debug, Default)]
pub struct MockPriceOracle {
    prices: Mutex<HashMap<String, f64>>,
    failing: Mutex<bool>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, mint: &str, price: f64) -> Self {
        self.prices.lock().unwrap().insert(mint.to_string(), price);
        self
    }

    pub fn with_failure(self) -> Self {
        *self.failing.lock().unwrap() = true;
        self
    }

    pub fn set_price(&self, mint: &str, price: f64) {
        self.prices.lock().unwrap().insert(mint.to_string(), price);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceOracle for MockPriceOracle {
    async fn get_usd_prices(&self, mints: &[String]) -> Result<HashMap<String, f64>, PriceError> {
        self.calls.lock().unwrap().push(mints.to_vec());
        if *self.failing.lock().unwrap() {
            return Err(PriceError::Http("injected failure".to_string()));
        }
        let prices = self.prices.lock().unwrap();
        Ok(mints
            .iter()
            .filter_map(|m| prices.get(m).map(|p| (m.clone(), *p)))
            .collect())
    }
}

/// Mock notifier recording every delivered message.
#[derive(Debug, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    failing: Mutex<bool>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(self) -> Self {
        *self.failing.lock().unwrap() = true;
        self
    }

    /// All (chat_id, text) pairs delivered so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        if *self.failing.lock().unwrap() {
            return Err(NotifyError::Http("injected failure".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}
