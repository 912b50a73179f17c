use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;

use crate::ports::chain::{BinReserves, ChainError, ChainReader, OnChainPosition, PairInfo, PoolDecimals};

use super::layout;

/// Liquidity-book chain reader backed by a Solana RPC endpoint.
///
/// The underlying `RpcClient` is synchronous; every call is bridged through
/// `spawn_blocking` so slow RPC never stalls the async monitor loop.
#[derive(Clone)]
pub struct DlmmClient {
    rpc: Arc<RpcClient>,
    program_id: Pubkey,
}

impl DlmmClient {
    pub fn new(rpc_url: String, program_id: &str, commitment: &str) -> Result<Self, ChainError> {
        let program_id = parse_pubkey(program_id, "program id")?;
        let commitment = match commitment {
            "processed" => CommitmentConfig::processed(),
            "finalized" => CommitmentConfig::finalized(),
            _ => CommitmentConfig::confirmed(),
        };
        let rpc = Arc::new(RpcClient::new_with_commitment(rpc_url, commitment));
        Ok(Self { rpc, program_id })
    }

    async fn fetch_account_data(&self, address: Pubkey) -> Result<Vec<u8>, ChainError> {
        let rpc = Arc::clone(&self.rpc);
        tokio::task::spawn_blocking(move || {
            rpc.get_account_data(&address)
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
        .map_err(|e| ChainError::Rpc(format!("task join error: {}", e)))?
    }

    async fn fetch_multiple(
        &self,
        addresses: Vec<Pubkey>,
    ) -> Result<Vec<Option<Vec<u8>>>, ChainError> {
        let rpc = Arc::clone(&self.rpc);
        tokio::task::spawn_blocking(move || {
            rpc.get_multiple_accounts(&addresses)
                .map(|accounts| {
                    accounts
                        .into_iter()
                        .map(|account| account.map(|a| a.data))
                        .collect()
                })
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
        .map_err(|e| ChainError::Rpc(format!("task join error: {}", e)))?
    }

    async fn fetch_pair_account(&self, market: &str) -> Result<layout::PairAccount, ChainError> {
        let address = parse_pubkey(market, "market")?;
        let data = self.fetch_account_data(address).await?;
        layout::decode_pair(&data, market)
    }

    /// Fetch and decode the bin arrays covering a position's range, keyed by
    /// array index. Arrays that do not exist yet hold no liquidity and are
    /// simply absent from the map.
    async fn fetch_bin_arrays(
        &self,
        pair: &Pubkey,
        lower_bin_id: i32,
        upper_bin_id: i32,
    ) -> Result<HashMap<i32, layout::BinArrayAccount>, ChainError> {
        let first = layout::bin_array_index(lower_bin_id);
        let last = layout::bin_array_index(upper_bin_id);
        let indices: Vec<i32> = (first..=last).collect();
        let addresses: Vec<Pubkey> = indices
            .iter()
            .map(|i| layout::bin_array_address(pair, *i, &self.program_id))
            .collect();

        let accounts = self.fetch_multiple(addresses.clone()).await?;

        let mut arrays = HashMap::new();
        for ((index, address), data) in indices.iter().zip(addresses).zip(accounts) {
            if let Some(data) = data {
                let array = layout::decode_bin_array(&data, &address.to_string())?;
                arrays.insert(*index, array);
            }
        }
        Ok(arrays)
    }
}

fn parse_pubkey(value: &str, what: &'static str) -> Result<Pubkey, ChainError> {
    Pubkey::from_str(value).map_err(|e| ChainError::InvalidAddress(what, e.to_string()))
}

#[async_trait]
impl ChainReader for DlmmClient {
    async fn get_pair(&self, market: &str) -> Result<PairInfo, ChainError> {
        let pair = self.fetch_pair_account(market).await?;
        Ok(PairInfo {
            token_mint_x: pair.token_mint_x.to_string(),
            token_mint_y: pair.token_mint_y.to_string(),
            active_bin: pair.active_id,
        })
    }

    async fn get_user_positions(
        &self,
        wallet: &str,
        market: &str,
    ) -> Result<Vec<OnChainPosition>, ChainError> {
        let owner = parse_pubkey(wallet, "wallet")?;
        let pair = parse_pubkey(market, "market")?;
        let program_id = self.program_id;

        let config = RpcProgramAccountsConfig {
            filters: Some(vec![
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                    layout::POSITION_PAIR_OFFSET,
                    pair.to_bytes().to_vec(),
                )),
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                    layout::POSITION_OWNER_OFFSET,
                    owner.to_bytes().to_vec(),
                )),
            ]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                ..Default::default()
            },
            ..Default::default()
        };

        let rpc = Arc::clone(&self.rpc);
        let accounts = tokio::task::spawn_blocking(move || {
            rpc.get_program_accounts_with_config(&program_id, config)
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
        .map_err(|e| ChainError::Rpc(format!("task join error: {}", e)))??;

        let mut positions = Vec::with_capacity(accounts.len());
        for (address, account) in accounts {
            let decoded = layout::decode_position(&account.data, &address.to_string())?;
            positions.push(OnChainPosition {
                mint: decoded.position_mint.to_string(),
                account: address.to_string(),
                lower_bin_id: decoded.lower_bin_id,
                upper_bin_id: decoded.upper_bin_id,
            });
        }
        Ok(positions)
    }

    async fn get_reserves(
        &self,
        position_account: &str,
        market: &str,
        _wallet: &str,
    ) -> Result<Vec<BinReserves>, ChainError> {
        let address = parse_pubkey(position_account, "position account")?;
        let pair = parse_pubkey(market, "market")?;

        let data = self.fetch_account_data(address).await?;
        let position = layout::decode_position(&data, position_account)?;

        let arrays = self
            .fetch_bin_arrays(&pair, position.lower_bin_id, position.upper_bin_id)
            .await?;

        let mut reserves = Vec::with_capacity(position.bin_count());
        for (i, bin_id) in (position.lower_bin_id..=position.upper_bin_id).enumerate() {
            let share = position.liquidity_shares[i];
            let bin = arrays
                .get(&layout::bin_array_index(bin_id))
                .map(|array| array.bins[layout::bin_offset_in_array(bin_id)])
                .unwrap_or_default();

            reserves.push(pro_rata_reserves(&bin, share));
        }
        Ok(reserves)
    }

    async fn get_pool_decimals(&self, market: &str) -> Result<PoolDecimals, ChainError> {
        let pair = self.fetch_pair_account(market).await?;

        let accounts = self
            .fetch_multiple(vec![pair.token_mint_x, pair.token_mint_y])
            .await?;

        let mint_data = |index: usize, mint: &Pubkey| -> Result<u8, ChainError> {
            let data = accounts
                .get(index)
                .and_then(|a| a.as_ref())
                .ok_or_else(|| ChainError::AccountNotFound(mint.to_string()))?;
            layout::decode_mint_decimals(data, &mint.to_string())
        };

        Ok(PoolDecimals {
            decimals_x: mint_data(0, &pair.token_mint_x)?,
            decimals_y: mint_data(1, &pair.token_mint_y)?,
        })
    }
}

/// A position's slice of one bin: its liquidity share against the bin's
/// outstanding supply, applied to both reserves.
fn pro_rata_reserves(bin: &layout::Bin, share: u128) -> BinReserves {
    if bin.total_supply == 0 || share == 0 {
        return BinReserves::default();
    }
    BinReserves {
        reserve_x: (bin.reserve_x as u128 * share / bin.total_supply) as u64,
        reserve_y: (bin.reserve_y as u128 * share / bin.total_supply) as u64,
    }
}
