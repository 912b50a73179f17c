//! Jupiter price API adapter.

pub mod price;

pub use price::JupiterPriceClient;
