//! Monitor Orchestrator
//!
//! Drives the recurring monitor cycle: reconcile, then value and evaluate
//! every stored Active position, deliver qualifying alerts, and persist new
//! baselines. Cycles never overlap; an overrun is logged and the next cycle
//! starts immediately after.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Notify, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};

use crate::domain::{self, OwnerProfile, TrackedPosition};
use crate::ports::chain::ChainReader;
use crate::ports::notify::Notifier;
use crate::ports::price::PriceOracle;
use crate::ports::store::{PositionFilter, PositionStore, PositionUpdate};

use super::messages;
use super::reconciler::Reconciler;
use super::valuation::{ValuationEngine, ValuationError};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("configuration error: {0}")]
    Config(String),
}

/// Cycle driver settings.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Fixed period between cycle starts
    pub interval: Duration,
    /// Cap on positions processed concurrently within a cycle
    pub max_concurrency: usize,
    /// Upper bound on any single remote call
    pub call_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(900),
            max_concurrency: 4,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// What one cycle did, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Rows created by reconciliation
    pub synced: usize,
    /// Positions valued and evaluated
    pub evaluated: usize,
    /// Alerts delivered (notify calls that succeeded)
    pub alerts_sent: usize,
    /// Positions skipped on error or missing data
    pub skipped: usize,
}

enum PositionOutcome {
    Evaluated { alerts_sent: usize },
    Skipped { alerts_sent: usize },
}

#[derive(Clone)]
pub struct MonitorOrchestrator {
    config: MonitorConfig,
    store: Arc<dyn PositionStore>,
    notifier: Arc<dyn Notifier>,
    reconciler: Reconciler,
    valuation: ValuationEngine,
    chain: Arc<dyn ChainReader>,
    is_running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
}

impl MonitorOrchestrator {
    pub fn new(
        config: MonitorConfig,
        chain: Arc<dyn ChainReader>,
        prices: Arc<dyn PriceOracle>,
        store: Arc<dyn PositionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, MonitorError> {
        if config.max_concurrency == 0 {
            return Err(MonitorError::Config("max_concurrency must be > 0".to_string()));
        }
        if config.interval.is_zero() {
            return Err(MonitorError::Config("interval must be > 0".to_string()));
        }

        let reconciler = Reconciler::new(
            Arc::clone(&chain),
            Arc::clone(&prices),
            Arc::clone(&store),
            config.call_timeout,
        );
        let valuation = ValuationEngine::new(
            Arc::clone(&chain),
            Arc::clone(&prices),
            config.call_timeout,
        );

        Ok(Self {
            config,
            store,
            notifier,
            reconciler,
            valuation,
            chain,
            is_running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Run cycles until `stop` is called. The next cycle is armed only after
    /// the previous one finishes.
    pub async fn run(&self) -> Result<(), MonitorError> {
        *self.is_running.write().await = true;

        tracing::info!(
            "starting position monitor - interval {:?}, concurrency {}",
            self.config.interval,
            self.config.max_concurrency
        );

        while *self.is_running.read().await {
            let started = Instant::now();
            let summary = self.run_cycle().await;
            let elapsed = started.elapsed();

            tracing::info!(
                "cycle complete in {:.1}s: {} synced, {} evaluated, {} alerts, {} skipped",
                elapsed.as_secs_f64(),
                summary.synced,
                summary.evaluated,
                summary.alerts_sent,
                summary.skipped
            );

            // A stop issued mid-cycle must not wait out the next interval.
            if !*self.is_running.read().await {
                break;
            }

            if elapsed >= self.config.interval {
                tracing::warn!(
                    "cycle overran the {:?} interval by {:?}, starting next immediately",
                    self.config.interval,
                    elapsed - self.config.interval
                );
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval - elapsed) => {}
                _ = self.shutdown.notified() => {}
            }
        }

        tracing::info!("position monitor stopped");
        Ok(())
    }

    /// Signal the run loop to exit after the current cycle.
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        self.shutdown.notify_waiters();
        tracing::info!("stop signal sent to monitor");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Execute one full monitor cycle.
    pub async fn run_cycle(&self) -> CycleSummary {
        tracing::info!("starting position monitor cycle");
        let mut summary = CycleSummary::default();

        // Reconciliation runs to completion before any valuation, so rows it
        // creates this cycle are valued with their fresh baselines intact.
        summary.synced = self.reconciler.reconcile_all().await.len();

        let positions = match self.store.find_positions(&PositionFilter::active()).await {
            Ok(positions) => positions,
            Err(e) => {
                tracing::error!("cycle aborted: failed to read store: {}", e);
                return summary;
            }
        };

        tracing::info!("found {} positions to monitor", positions.len());

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = JoinSet::new();

        for position in positions {
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return PositionOutcome::Skipped { alerts_sent: 0 },
                };
                this.process_position(position).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(PositionOutcome::Evaluated { alerts_sent }) => {
                    summary.evaluated += 1;
                    summary.alerts_sent += alerts_sent;
                }
                Ok(PositionOutcome::Skipped { alerts_sent }) => {
                    summary.skipped += 1;
                    summary.alerts_sent += alerts_sent;
                }
                Err(e) => {
                    // A panicked task loses one position, never the batch.
                    tracing::error!("position task failed: {}", e);
                    summary.skipped += 1;
                }
            }
        }

        summary
    }

    /// Value and evaluate one position. Every failure path is contained
    /// here; the cycle keeps going for all other positions.
    async fn process_position(&self, position: TrackedPosition) -> PositionOutcome {
        let owner = match self.resolve_owner(&position).await {
            Some(owner) => owner,
            None => return PositionOutcome::Skipped { alerts_sent: 0 },
        };
        let Some(wallet) = owner.wallet.clone() else {
            tracing::debug!("no wallet for owner {}, skipping {}", owner.id, position.mint);
            return PositionOutcome::Skipped { alerts_sent: 0 };
        };

        let active_bin = match timeout(
            self.config.call_timeout,
            self.chain.get_active_bin(&position.market),
        )
        .await
        {
            Ok(Ok(active_bin)) => active_bin,
            Ok(Err(e)) => {
                tracing::warn!("active bin lookup failed for {}: {}", position.market, e);
                return PositionOutcome::Skipped { alerts_sent: 0 };
            }
            Err(_) => {
                tracing::warn!("active bin lookup timed out for {}", position.market);
                return PositionOutcome::Skipped { alerts_sent: 0 };
            }
        };

        if position.is_in_range(active_bin) {
            tracing::debug!(
                "position {} in range ({} in {}..{})",
                position.mint,
                active_bin,
                position.lower_bin_id,
                position.upper_bin_id
            );
        } else {
            tracing::warn!(
                "position {} out of range: active {} outside {}..{}",
                position.mint,
                active_bin,
                position.lower_bin_id,
                position.upper_bin_id
            );
        }

        match self.valuation.value(&wallet, &position).await {
            Ok(current) => {
                let evaluation = domain::evaluate(&position, &current, active_bin);

                let mut alerts_sent = 0;
                for alert in &evaluation.alerts {
                    let text = messages::render(&position, Some(&current), alert);
                    if self.deliver(&owner.chat_id, &text).await {
                        alerts_sent += 1;
                    }
                }

                // The baseline write happens regardless of delivery outcome;
                // correctness of future comparisons never waits on Telegram.
                if !evaluation.update.is_empty() {
                    let update = PositionUpdate {
                        last_valuation_usd: evaluation.update.last_valuation_usd,
                        last_il_warning_percent: evaluation.update.last_il_warning_percent,
                        status: None,
                    };
                    if let Err(e) = self.store.update_position(position.id, update).await {
                        tracing::error!("baseline update failed for {}: {}", position.mint, e);
                    }
                }

                PositionOutcome::Evaluated { alerts_sent }
            }
            Err(ValuationError::PositionNotFound(mint)) => {
                // The row stays as-is: the mint may resolve again next cycle,
                // and removal belongs to an explicit exit flow. Range status
                // is still a point-in-time fact worth reporting.
                tracing::info!("position {} not found in current user positions", mint);
                let mut alerts_sent = 0;
                if let Some(alert) = domain::range_exit(&position, active_bin) {
                    let text = messages::render(&position, None, &alert);
                    if self.deliver(&owner.chat_id, &text).await {
                        alerts_sent += 1;
                    }
                }
                PositionOutcome::Skipped { alerts_sent }
            }
            Err(e) => {
                tracing::warn!("valuation failed for {}: {}", position.mint, e);
                PositionOutcome::Skipped { alerts_sent: 0 }
            }
        }
    }

    async fn resolve_owner(&self, position: &TrackedPosition) -> Option<OwnerProfile> {
        match self.store.find_owner(&position.owner_id).await {
            Ok(Some(owner)) => Some(owner),
            Ok(None) => {
                tracing::warn!(
                    "owner {} not found for position {}, skipping",
                    position.owner_id,
                    position.mint
                );
                None
            }
            Err(e) => {
                tracing::error!("owner lookup failed for {}: {}", position.owner_id, e);
                None
            }
        }
    }

    /// One delivery attempt; failures are swallowed. Returns whether the
    /// alert went out.
    async fn deliver(&self, chat_id: &str, text: &str) -> bool {
        match timeout(self.config.call_timeout, self.notifier.notify(chat_id, text)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!("failed to deliver alert to {}: {}", chat_id, e);
                false
            }
            Err(_) => {
                tracing::warn!("alert delivery to {} timed out", chat_id);
                false
            }
        }
    }
}
