//! Account layouts for the liquidity-book program.
//!
//! Fixed-offset decoding of the three account kinds the monitor reads:
//! pair, position, and bin array. All integers are little-endian; every
//! account starts with an 8-byte discriminator.

use solana_sdk::pubkey::Pubkey;

use crate::ports::chain::ChainError;

/// Bins held by a single bin-array account.
pub const BINS_PER_ARRAY: i32 = 70;

/// Widest bin range a single position account may cover.
pub const MAX_POSITION_BINS: i64 = 1400;

const DISCRIMINATOR_LEN: usize = 8;

// Pair account: discriminator, token_mint_x, token_mint_y, bin_step, active_id
const PAIR_MINT_X_OFFSET: usize = 8;
const PAIR_MINT_Y_OFFSET: usize = 40;
const PAIR_BIN_STEP_OFFSET: usize = 72;
const PAIR_ACTIVE_ID_OFFSET: usize = 74;
pub const PAIR_LEN: usize = 78;

// Position account: discriminator, pair, owner, position_mint, lower, upper,
// then one u128 liquidity share per covered bin.
pub const POSITION_PAIR_OFFSET: usize = 8;
pub const POSITION_OWNER_OFFSET: usize = 40;
const POSITION_MINT_OFFSET: usize = 72;
const POSITION_LOWER_OFFSET: usize = 104;
const POSITION_UPPER_OFFSET: usize = 108;
pub const POSITION_HEADER_LEN: usize = 112;
const SHARE_SIZE: usize = 16;

// Bin array account: discriminator, pair, index, padding, then bins.
const BIN_ARRAY_PAIR_OFFSET: usize = 8;
const BIN_ARRAY_INDEX_OFFSET: usize = 40;
const BIN_ARRAY_BINS_OFFSET: usize = 48;
const BIN_SIZE: usize = 32;
pub const BIN_ARRAY_LEN: usize = BIN_ARRAY_BINS_OFFSET + BINS_PER_ARRAY as usize * BIN_SIZE;

const BIN_ARRAY_SEED: &[u8] = b"bin_array";

#[derive(Debug, Clone)]
pub struct PairAccount {
    pub token_mint_x: Pubkey,
    pub token_mint_y: Pubkey,
    pub bin_step: u16,
    pub active_id: i32,
}

#[derive(Debug, Clone)]
pub struct PositionAccount {
    pub pair: Pubkey,
    pub owner: Pubkey,
    pub position_mint: Pubkey,
    pub lower_bin_id: i32,
    pub upper_bin_id: i32,
    /// Liquidity share per bin, lower to upper inclusive
    pub liquidity_shares: Vec<u128>,
}

impl PositionAccount {
    pub fn bin_count(&self) -> usize {
        (self.upper_bin_id - self.lower_bin_id + 1) as usize
    }
}

/// One bin's reserves and outstanding supply.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bin {
    pub reserve_x: u64,
    pub reserve_y: u64,
    pub total_supply: u128,
}

#[derive(Debug, Clone)]
pub struct BinArrayAccount {
    pub pair: Pubkey,
    pub index: i32,
    pub bins: Vec<Bin>,
}

fn decode_err(account: &str, reason: impl Into<String>) -> ChainError {
    ChainError::Decode(account.to_string(), reason.into())
}

fn read_pubkey(data: &[u8], offset: usize, account: &str) -> Result<Pubkey, ChainError> {
    let bytes = data
        .get(offset..offset + 32)
        .ok_or_else(|| decode_err(account, format!("truncated at offset {}", offset)))?;
    Pubkey::try_from(bytes).map_err(|e| decode_err(account, e.to_string()))
}

fn read_u16(data: &[u8], offset: usize, account: &str) -> Result<u16, ChainError> {
    let bytes = data
        .get(offset..offset + 2)
        .ok_or_else(|| decode_err(account, format!("truncated at offset {}", offset)))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_i32(data: &[u8], offset: usize, account: &str) -> Result<i32, ChainError> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or_else(|| decode_err(account, format!("truncated at offset {}", offset)))?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64(data: &[u8], offset: usize, account: &str) -> Result<u64, ChainError> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or_else(|| decode_err(account, format!("truncated at offset {}", offset)))?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

fn read_u128(data: &[u8], offset: usize, account: &str) -> Result<u128, ChainError> {
    let bytes = data
        .get(offset..offset + 16)
        .ok_or_else(|| decode_err(account, format!("truncated at offset {}", offset)))?;
    let mut buf = [0u8; 16];
    buf.copy_from_slice(bytes);
    Ok(u128::from_le_bytes(buf))
}

pub fn decode_pair(data: &[u8], account: &str) -> Result<PairAccount, ChainError> {
    if data.len() < PAIR_LEN {
        return Err(decode_err(
            account,
            format!("pair account too short: {} bytes", data.len()),
        ));
    }
    Ok(PairAccount {
        token_mint_x: read_pubkey(data, PAIR_MINT_X_OFFSET, account)?,
        token_mint_y: read_pubkey(data, PAIR_MINT_Y_OFFSET, account)?,
        bin_step: read_u16(data, PAIR_BIN_STEP_OFFSET, account)?,
        active_id: read_i32(data, PAIR_ACTIVE_ID_OFFSET, account)?,
    })
}

pub fn decode_position(data: &[u8], account: &str) -> Result<PositionAccount, ChainError> {
    if data.len() < POSITION_HEADER_LEN {
        return Err(decode_err(
            account,
            format!("position account too short: {} bytes", data.len()),
        ));
    }

    let lower_bin_id = read_i32(data, POSITION_LOWER_OFFSET, account)?;
    let upper_bin_id = read_i32(data, POSITION_UPPER_OFFSET, account)?;
    if lower_bin_id > upper_bin_id {
        return Err(decode_err(
            account,
            format!("inverted bin range {}..{}", lower_bin_id, upper_bin_id),
        ));
    }

    let span = upper_bin_id as i64 - lower_bin_id as i64 + 1;
    if span > MAX_POSITION_BINS {
        return Err(decode_err(
            account,
            format!("bin range spans {} bins, max {}", span, MAX_POSITION_BINS),
        ));
    }

    let bin_count = span as usize;
    let mut liquidity_shares = Vec::with_capacity(bin_count);
    for i in 0..bin_count {
        liquidity_shares.push(read_u128(
            data,
            POSITION_HEADER_LEN + i * SHARE_SIZE,
            account,
        )?);
    }

    Ok(PositionAccount {
        pair: read_pubkey(data, POSITION_PAIR_OFFSET, account)?,
        owner: read_pubkey(data, POSITION_OWNER_OFFSET, account)?,
        position_mint: read_pubkey(data, POSITION_MINT_OFFSET, account)?,
        lower_bin_id,
        upper_bin_id,
        liquidity_shares,
    })
}

pub fn decode_bin_array(data: &[u8], account: &str) -> Result<BinArrayAccount, ChainError> {
    if data.len() < BIN_ARRAY_LEN {
        return Err(decode_err(
            account,
            format!("bin array account too short: {} bytes", data.len()),
        ));
    }

    let mut bins = Vec::with_capacity(BINS_PER_ARRAY as usize);
    for i in 0..BINS_PER_ARRAY as usize {
        let offset = BIN_ARRAY_BINS_OFFSET + i * BIN_SIZE;
        bins.push(Bin {
            reserve_x: read_u64(data, offset, account)?,
            reserve_y: read_u64(data, offset + 8, account)?,
            total_supply: read_u128(data, offset + 16, account)?,
        });
    }

    Ok(BinArrayAccount {
        pair: read_pubkey(data, BIN_ARRAY_PAIR_OFFSET, account)?,
        index: read_i32(data, BIN_ARRAY_INDEX_OFFSET, account)?,
        bins,
    })
}

/// SPL mint account layout puts the decimal exponent at byte 44.
pub fn decode_mint_decimals(data: &[u8], account: &str) -> Result<u8, ChainError> {
    data.get(44)
        .copied()
        .ok_or_else(|| decode_err(account, format!("mint account too short: {} bytes", data.len())))
}

/// Bin-array index covering a bin id. Negative ids round toward negative
/// infinity so adjacent arrays tile the id space without gaps.
pub fn bin_array_index(bin_id: i32) -> i32 {
    bin_id.div_euclid(BINS_PER_ARRAY)
}

/// Offset of a bin id within its array.
pub fn bin_offset_in_array(bin_id: i32) -> usize {
    bin_id.rem_euclid(BINS_PER_ARRAY) as usize
}

/// Derive the bin-array PDA for a pair.
pub fn bin_array_address(pair: &Pubkey, index: i32, program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[BIN_ARRAY_SEED, pair.as_ref(), &index.to_le_bytes()],
        program_id,
    )
    .0
}
