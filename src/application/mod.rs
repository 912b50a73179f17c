//! Application Layer - Monitor orchestration
//!
//! Wires the port implementations into the recurring monitor cycle:
//! reconcile on-chain positions into the store, value every tracked
//! position, decide alerts, deliver them, persist new baselines.

pub mod messages;
pub mod monitor;
pub mod reconciler;
pub mod valuation;

pub use monitor::{CycleSummary, MonitorConfig, MonitorError, MonitorOrchestrator};
pub use reconciler::Reconciler;
pub use valuation::{ValuationEngine, ValuationError};
