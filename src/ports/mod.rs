//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, these traits abstract:
//! - On-chain liquidity-book reads (pair metadata, positions, reserves)
//! - Spot USD price lookups
//! - The tracked-position store
//! - Alert delivery

pub mod chain;
pub mod price;
pub mod store;
pub mod notify;
pub mod mocks;

pub use chain::{BinReserves, ChainError, ChainReader, OnChainPosition, PairInfo, PoolDecimals};
pub use notify::{LogNotifier, Notifier, NotifyError};
pub use price::{PriceError, PriceOracle};
pub use store::{PositionFilter, PositionStore, PositionUpdate, StoreError};
