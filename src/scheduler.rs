//! Cycle Scheduler
//!
//! Running: fetch farms and one price snapshot, then process every farm in
//! order. Idle: sleep until the next cycle. A farm's failure is logged and
//! recorded; only the two cycle dependencies can fail a cycle.

use alloy_primitives::TxHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

use crate::aggregator::{CycleContext, TvlAggregator};
use crate::errors::{KeeperError, KeeperResult};
use crate::farms::{Farm, FarmSource};
use crate::price_index::{PriceResolver, PriceSource, StableReference};
use crate::registry::RegistryWriter;
use crate::tokens::SubstitutionTable;

/// Reference deployment runs every 15 minutes
pub const DEFAULT_LOOP_INTERVAL_SECS: u64 = 15 * 60;

pub const DEFAULT_FARM_TIMEOUT_SECS: u64 = 120;

// ============================================
// POLICY & STATE
// ============================================

/// What to do when the farm list or price snapshot cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleFailurePolicy {
    /// Stop and surface the error; a process supervisor restarts the keeper
    #[default]
    Exit,
    /// Log, wait one interval, try again
    Retry,
}

impl FromStr for CycleFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exit" => Ok(CycleFailurePolicy::Exit),
            "retry" => Ok(CycleFailurePolicy::Retry),
            other => Err(format!("unknown cycle failure policy '{}' (exit|retry)", other)),
        }
    }
}

impl fmt::Display for CycleFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleFailurePolicy::Exit => write!(f, "exit"),
            CycleFailurePolicy::Retry => write!(f, "retry"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub farm_timeout: Duration,
    pub run_once: bool,
    pub on_cycle_failure: CycleFailurePolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_LOOP_INTERVAL_SECS),
            farm_timeout: Duration::from_secs(DEFAULT_FARM_TIMEOUT_SECS),
            run_once: false,
            on_cycle_failure: CycleFailurePolicy::Exit,
        }
    }
}

// ============================================
// REPORTS
// ============================================

#[derive(Debug, Clone, PartialEq)]
pub enum FarmOutcome {
    Published {
        tx_hash: TxHash,
        tvl_usd: f64,
        rewards_usd_per_year: f64,
    },
    /// Valued but not published by policy
    Skipped { tvl_usd: f64 },
    Failed(KeeperError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FarmReport {
    pub farm: Farm,
    pub outcome: FarmOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// Unix seconds used as "now" for every farm
    pub now: u64,
    pub farms: Vec<FarmReport>,
    pub duration: Duration,
}

impl CycleReport {
    fn count(&self, pred: impl Fn(&FarmOutcome) -> bool) -> usize {
        self.farms.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn published(&self) -> usize {
        self.count(|o| matches!(o, FarmOutcome::Published { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FarmOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FarmOutcome::Failed(_)))
    }

    /// Sum of TVL over published farms
    pub fn published_tvl_usd(&self) -> f64 {
        self.farms
            .iter()
            .filter_map(|r| match r.outcome {
                FarmOutcome::Published { tvl_usd, .. } => Some(tvl_usd),
                _ => None,
            })
            .sum()
    }
}

// ============================================
// SCHEDULER
// ============================================

/// Source of "now" in unix seconds
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub struct Scheduler {
    farms: Arc<dyn FarmSource>,
    prices: Arc<dyn PriceSource>,
    aggregator: TvlAggregator,
    writer: Arc<dyn RegistryWriter>,
    substitutions: Arc<SubstitutionTable>,
    stable: StableReference,
    settings: SchedulerSettings,
    clock: Clock,
    state: SchedulerState,
    cycles: u64,
}

impl Scheduler {
    pub fn new(
        farms: Arc<dyn FarmSource>,
        prices: Arc<dyn PriceSource>,
        aggregator: TvlAggregator,
        writer: Arc<dyn RegistryWriter>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            farms,
            prices,
            aggregator,
            writer,
            substitutions: Arc::new(SubstitutionTable::new()),
            stable: StableReference::default(),
            settings,
            clock: Arc::new(unix_now),
            state: SchedulerState::Idle,
            cycles: 0,
        }
    }

    pub fn with_pricing(mut self, substitutions: SubstitutionTable, stable: StableReference) -> Self {
        self.substitutions = Arc::new(substitutions);
        self.stable = stable;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// One full cycle with "now" read once from the scheduler's clock
    pub async fn run_cycle(&mut self) -> KeeperResult<CycleReport> {
        let now = (self.clock)();
        self.run_cycle_at(now).await
    }

    pub async fn run_cycle_at(&mut self, now: u64) -> KeeperResult<CycleReport> {
        self.state = SchedulerState::Running;
        let result = self.process_cycle(now).await;
        self.state = SchedulerState::Idle;
        self.cycles += 1;
        result
    }

    async fn process_cycle(&self, now: u64) -> KeeperResult<CycleReport> {
        let start = Instant::now();
        let started_at = Utc::now();

        let farms = self.farms.farms().await?;
        let snapshot = self.prices.snapshot().await?;

        info!(
            "🔄 Cycle {}: {} farms, {} priced tokens (now={})",
            self.cycles + 1,
            farms.len(),
            snapshot.len(),
            now
        );

        let ctx = CycleContext::new(
            now,
            PriceResolver::new(Arc::new(snapshot), self.substitutions.clone(), self.stable),
        );

        let mut reports = Vec::with_capacity(farms.len());
        for farm in farms {
            let outcome = match tokio::time::timeout(self.settings.farm_timeout, self.process_farm(&farm, &ctx)).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    error!("❌ Failed to update farm {}: {}", farm, e);
                    FarmOutcome::Failed(e)
                }
                Err(_) => {
                    error!("❌ Farm {} timed out after {:?}", farm, self.settings.farm_timeout);
                    FarmOutcome::Failed(KeeperError::Timeout(self.settings.farm_timeout))
                }
            };
            reports.push(FarmReport { farm, outcome });
        }

        Ok(CycleReport {
            started_at,
            now,
            farms: reports,
            duration: start.elapsed(),
        })
    }

    async fn process_farm(&self, farm: &Farm, ctx: &CycleContext) -> KeeperResult<FarmOutcome> {
        info!("Fetching {}", farm);
        let result = self.aggregator.aggregate(farm, ctx).await?;

        if !result.should_publish {
            info!(
                "⏭️  Skipping {}: no active rewards across {} hops (terminus {:?})",
                farm, result.hops, result.terminus
            );
            return Ok(FarmOutcome::Skipped { tvl_usd: result.tvl_usd });
        }

        // Encode both before writing so a bad figure never publishes half a pair
        let (tvl, rewards) = result.fixed_point()?;
        let tx_hash = self.writer.update_farm_data(farm.address, tvl, rewards).await?;

        info!(
            "✅ {} tvl=${:.2} rewards=${:.2}/yr tx={:?}",
            farm, result.tvl_usd, result.rewards_usd_per_year, tx_hash
        );

        Ok(FarmOutcome::Published {
            tx_hash,
            tvl_usd: result.tvl_usd,
            rewards_usd_per_year: result.rewards_usd_per_year,
        })
    }

    /// Loop until run-once completes, a cycle fails under `Exit`, or `shutdown` resolves.
    /// Shutdown drops the in-flight cycle, cancelling the current farm.
    pub async fn run<F>(&mut self, shutdown: F) -> KeeperResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);

        loop {
            let cycle = tokio::select! {
                _ = &mut shutdown => None,
                cycle = self.run_cycle() => Some(cycle),
            };

            let Some(cycle) = cycle else {
                self.state = SchedulerState::Idle;
                info!("🛑 Shutdown requested, abandoning cycle");
                return Ok(());
            };

            match cycle {
                Ok(report) => {
                    info!(
                        "📊 Cycle done in {:?}: {} published (${:.2} TVL), {} skipped, {} failed",
                        report.duration,
                        report.published(),
                        report.published_tvl_usd(),
                        report.skipped(),
                        report.failed()
                    );
                    if self.settings.run_once {
                        info!("Run-once mode, exiting");
                        return Ok(());
                    }
                }
                Err(e) => match self.settings.on_cycle_failure {
                    CycleFailurePolicy::Exit => {
                        error!("Cycle aborted: {}", e);
                        return Err(e);
                    }
                    CycleFailurePolicy::Retry => {
                        warn!("Cycle aborted: {}; retrying in {:?}", e, self.settings.interval);
                    }
                },
            }

            info!("💤 Idle for {:?}", self.settings.interval);
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 Shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
