//! Bin Sentinel - DLMM Liquidity Position Monitor for Solana
//!
//! Watches tracked liquidity-book positions and alerts their owners on
//! range exit, material value moves, and impermanent loss.
//!
//! # Modules
//!
//! - `domain`: Core business logic (TrackedPosition, valuation math, alert policy)
//! - `ports`: Trait abstractions (ChainReader, PriceOracle, PositionStore, Notifier)
//! - `adapters`: External implementations (DLMM RPC, Jupiter prices, JSON store, Telegram, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Monitor orchestrator, reconciler, valuation engine

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
