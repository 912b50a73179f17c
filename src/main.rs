//! Bin Sentinel - DLMM Liquidity Position Monitor for Solana
//!
//! Tracks registered users' liquidity-book positions and alerts them on
//! range exit, material value changes, and impermanent loss.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use bin_sentinel::adapters::cli::{CheckPositionCmd, CliApp, Command, RunCmd, StatusCmd};
use bin_sentinel::adapters::{DlmmClient, JsonPositionStore, JupiterPriceClient, TelegramNotifier};
use bin_sentinel::application::{MonitorConfig, MonitorOrchestrator};
use bin_sentinel::config::{load_config, Config};
use bin_sentinel::domain::PositionValue;
use bin_sentinel::ports::chain::ChainReader;
use bin_sentinel::ports::notify::{LogNotifier, Notifier};
use bin_sentinel::ports::price::PriceOracle;
use bin_sentinel::ports::store::{PositionFilter, PositionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (bot token lives here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug);

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Status(cmd) => status_command(cmd).await,
        Command::CheckPosition(cmd) => check_position_command(cmd).await,
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

fn build_chain(config: &Config, rpc_override: Option<String>) -> Result<DlmmClient> {
    let rpc_url = rpc_override.unwrap_or_else(|| config.solana.get_rpc_url());
    DlmmClient::new(rpc_url, &config.solana.dlmm_program, &config.solana.commitment)
        .context("Failed to create chain client")
}

fn build_prices(config: &Config) -> Result<JupiterPriceClient> {
    JupiterPriceClient::new(
        config.price.api_url.clone(),
        Duration::from_secs(config.price.timeout_secs),
    )
    .context("Failed to create price client")
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    if config.telegram.enabled {
        let token = config
            .telegram
            .get_bot_token()
            .context("Telegram alerts enabled but no bot token configured (set TELEGRAM_BOT_TOKEN)")?;
        let notifier = TelegramNotifier::new(
            config.telegram.api_url.clone(),
            token,
            Duration::from_secs(config.monitor.call_timeout_secs),
        )
        .context("Failed to create Telegram notifier")?;
        Ok(Arc::new(notifier))
    } else {
        tracing::warn!("Telegram delivery disabled - alerts will only be logged");
        Ok(Arc::new(LogNotifier))
    }
}

async fn run_command(cmd: RunCmd) -> Result<()> {
    tracing::info!("Starting bin-sentinel...");

    let config = load_config(&cmd.config).context("Failed to load configuration")?;

    let chain = build_chain(&config, cmd.rpc_url)?;
    let prices = build_prices(&config)?;
    let store = JsonPositionStore::open(&config.store.data_dir)
        .context("Failed to open position store")?;
    let notifier = build_notifier(&config)?;

    let mut monitor_config = MonitorConfig::from(&config.monitor);
    if let Some(interval) = cmd.interval {
        monitor_config.interval = Duration::from_secs(interval);
    }

    let orchestrator = MonitorOrchestrator::new(
        monitor_config,
        Arc::new(chain),
        Arc::new(prices),
        Arc::new(store),
        notifier,
    )
    .context("Failed to create monitor")?;

    // Ctrl+C finishes the current cycle, then exits.
    let orch = orchestrator.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        orch.stop().await;
    });

    orchestrator.run().await?;
    tracing::info!("bin-sentinel stopped");
    Ok(())
}

async fn status_command(cmd: StatusCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let store = JsonPositionStore::open(&config.store.data_dir)
        .context("Failed to open position store")?;

    let positions = store.find_positions(&PositionFilter::default()).await?;
    let active = positions.iter().filter(|p| p.is_active()).count();

    println!("Tracked positions: {} ({} active)", positions.len(), active);

    let mut per_market: BTreeMap<&str, usize> = BTreeMap::new();
    for position in &positions {
        *per_market.entry(position.market.as_str()).or_insert(0) += 1;
    }
    for (market, count) in per_market {
        println!("  {}: {} position(s)", market, count);
    }

    Ok(())
}

async fn check_position_command(cmd: CheckPositionCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let chain = build_chain(&config, None)?;
    let prices = build_prices(&config)?;

    let reserves = chain
        .get_reserves(&cmd.position, &cmd.market, &cmd.wallet)
        .await
        .context("Failed to read position reserves")?;

    let (raw_x, raw_y) = reserves.iter().fold((0u128, 0u128), |(x, y), bin| {
        (x + bin.reserve_x as u128, y + bin.reserve_y as u128)
    });

    let pair = chain
        .get_pair(&cmd.market)
        .await
        .context("Failed to read pair metadata")?;
    let decimals = chain
        .get_pool_decimals(&cmd.market)
        .await
        .context("Failed to read pool decimals")?;

    let price_map = prices
        .get_usd_prices(&[pair.token_mint_x.clone(), pair.token_mint_y.clone()])
        .await
        .context("Failed to fetch prices")?;
    let price_x = price_map.get(&pair.token_mint_x).copied().unwrap_or(0.0);
    let price_y = price_map.get(&pair.token_mint_y).copied().unwrap_or(0.0);

    let value = PositionValue::from_raw(
        raw_x,
        raw_y,
        decimals.decimals_x,
        decimals.decimals_y,
        price_x,
        price_y,
    );

    println!("Position: {}", cmd.position);
    println!("Market:   {} ({} bins)", cmd.market, reserves.len());
    println!(
        "Token X:  {:.6} @ ${:.6} = ${:.2}",
        value.token_x_amount,
        value.token_x_price_usd,
        value.token_x_amount * value.token_x_price_usd
    );
    println!(
        "Token Y:  {:.6} @ ${:.6} = ${:.2}",
        value.token_y_amount,
        value.token_y_price_usd,
        value.token_y_amount * value.token_y_price_usd
    );
    println!("Total:    ${:.2}", value.usd_value);

    Ok(())
}
