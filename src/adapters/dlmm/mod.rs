//! Liquidity-book (DLMM) chain reader over Solana RPC.

pub mod client;
pub mod layout;

pub use client::DlmmClient;
