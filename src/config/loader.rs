//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml
//! structure. Secrets (the Telegram bot token) come from the environment,
//! not from the file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::application::MonitorConfig;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub solana: SolanaSection,
    pub store: StoreSection,
    #[serde(default)]
    pub price: PriceSection,
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Solana RPC configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SolanaSection {
    /// RPC endpoint (use private RPC for production)
    pub rpc_url: String,
    /// Commitment level: "processed", "confirmed", "finalized"
    #[serde(default = "default_commitment")]
    pub commitment: String,
    /// Liquidity-book program to read positions from
    #[serde(default = "default_dlmm_program")]
    pub dlmm_program: String,
}

impl SolanaSection {
    /// RPC URL with environment variable override.
    /// Checks SOLANA_RPC_URL env var first, falls back to config value.
    pub fn get_rpc_url(&self) -> String {
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }
}

/// Position store configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// Directory holding the position and owner tables
    pub data_dir: String,
}

/// Price API configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct PriceSection {
    /// Jupiter price API base URL
    #[serde(default = "default_price_api")]
    pub api_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_price_timeout")]
    pub timeout_secs: u64,
}

impl Default for PriceSection {
    fn default() -> Self {
        Self {
            api_url: default_price_api(),
            timeout_secs: default_price_timeout(),
        }
    }
}

/// Telegram delivery configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    /// Enable Telegram alert delivery; alerts are logged otherwise
    #[serde(default)]
    pub enabled: bool,
    /// Bot token; prefer the TELEGRAM_BOT_TOKEN env var over this field
    #[serde(default)]
    pub bot_token: String,
    /// Bot API base URL
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            api_url: default_telegram_api(),
        }
    }
}

impl TelegramSection {
    /// Bot token with environment variable fallback.
    /// Checks TELEGRAM_BOT_TOKEN env var if the config value is empty.
    pub fn get_bot_token(&self) -> Option<String> {
        if !self.bot_token.is_empty() {
            return Some(self.bot_token.clone());
        }
        std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty())
    }
}

/// Monitor cycle configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// Seconds between cycle starts
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Positions processed concurrently within a cycle
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
    /// Upper bound in seconds on any single remote call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            max_concurrency: default_concurrency(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_dlmm_program() -> String {
    "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo".to_string()
}

fn default_price_api() -> String {
    "https://lite-api.jup.ag/price/v3".to_string()
}

fn default_price_timeout() -> u64 {
    10
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_interval() -> u64 {
    900 // 15 minutes
}

fn default_concurrency() -> usize {
    4
}

fn default_call_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solana.rpc_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc_url cannot be empty".to_string(),
            ));
        }

        if self.solana.dlmm_program.is_empty() {
            return Err(ConfigError::ValidationError(
                "dlmm_program cannot be empty".to_string(),
            ));
        }

        if self.store.data_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "data_dir cannot be empty".to_string(),
            ));
        }

        if self.price.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "price api_url cannot be empty".to_string(),
            ));
        }

        if self.price.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "price timeout_secs must be > 0".to_string(),
            ));
        }

        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "interval_secs must be > 0".to_string(),
            ));
        }

        if self.monitor.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrency must be > 0".to_string(),
            ));
        }

        if self.monitor.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "call_timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl From<&MonitorSection> for MonitorConfig {
    fn from(section: &MonitorSection) -> Self {
        MonitorConfig {
            interval: Duration::from_secs(section.interval_secs),
            max_concurrency: section.max_concurrency,
            call_timeout: Duration::from_secs(section.call_timeout_secs),
        }
    }
}
