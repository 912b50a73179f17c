//! CLI Command Definitions
//!
//! Argument parsing for the bin-sentinel monitor.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bin Sentinel - DLMM Liquidity Position Monitor for Solana
#[derive(Parser, Debug)]
#[command(
    name = "bin-sentinel",
    version = env!("CARGO_PKG_VERSION"),
    about = "DLMM liquidity position monitor for Solana",
    long_about = "Bin Sentinel tracks registered users' liquidity-book positions and \
                  alerts them on range exit, material value changes, and impermanent loss."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the monitor loop
    Run(RunCmd),

    /// Show tracked positions and owners
    Status(StatusCmd),

    /// Value a single position account once and print the breakdown
    CheckPosition(CheckPositionCmd),
}

/// Start the monitor loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,

    /// Override the cycle interval in seconds
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Override RPC URL
    #[arg(long, value_name = "URL")]
    pub rpc_url: Option<String>,
}

/// Show tracked positions and owners
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,
}

/// Value a single position account
#[derive(Parser, Debug)]
pub struct CheckPositionCmd {
    /// Position account address
    #[arg(value_name = "POSITION")]
    pub position: String,

    /// Pool/pair address the position belongs to
    #[arg(value_name = "MARKET")]
    pub market: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,

    /// Payer wallet for the read (any address works for a read-only query)
    #[arg(long, value_name = "PUBKEY", default_value = "11111111111111111111111111111111")]
    pub wallet: String,
}
