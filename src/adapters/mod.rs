//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - DLMM: liquidity-book account reads over Solana RPC
//! - Jupiter: spot USD price API client
//! - Store: JSON-file position store
//! - Telegram: Bot API alert delivery
//! - CLI: Command-line interface handlers

pub mod dlmm;
pub mod jupiter;
pub mod store;
pub mod telegram;
pub mod cli;

pub use cli::CliApp;
pub use dlmm::DlmmClient;
pub use jupiter::JupiterPriceClient;
pub use store::JsonPositionStore;
pub use telegram::TelegramNotifier;
