//! Strategy Engine
//!
//! Drives decision cycles: trend, pool fetch, selection, persistence. One
//! cycle per tier at a time; a failed cycle writes nothing and leaves the
//! previous decision in place.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::classifier::RiskClassifier;
use super::selector::StrategySelector;
use super::trend::TrendDetector;
use super::types::{RiskTier, StrategyDecision, TrendDirection};
use crate::config::{Config, SelectionConfig};
use crate::error::Result;
use crate::market::{LiveMarketData, MarketData};
use crate::store::StrategyStore;

/// Result of one completed cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A pool was selected and the decision stored
    Persisted(StrategyDecision),
    /// Nothing qualified for the tier; the stored decision is untouched
    NoEligiblePool { trend: TrendDirection },
}

pub struct StrategyEngine {
    market: Arc<dyn MarketData>,
    trend: TrendDetector,
    selector: StrategySelector,
    store: StrategyStore,
    reference_asset: String,
    lookback_days: u32,
    low_lock: Mutex<()>,
    high_lock: Mutex<()>,
}

impl StrategyEngine {
    pub fn new(
        market: Arc<dyn MarketData>,
        selector: StrategySelector,
        store: StrategyStore,
        selection: &SelectionConfig,
    ) -> Self {
        Self {
            trend: TrendDetector::new(market.clone()),
            market,
            selector,
            store,
            reference_asset: selection.reference_asset.clone(),
            lookback_days: selection.lookback_days,
            low_lock: Mutex::new(()),
            high_lock: Mutex::new(()),
        }
    }

    /// Engine over live feeds and the configured store
    pub fn from_config(config: &Config) -> Result<Self> {
        let market: Arc<dyn MarketData> = Arc::new(LiveMarketData::with_retry(&config.feeds));
        let selector = StrategySelector::new(
            RiskClassifier::from_config(&config.risk),
            &config.selection.target_asset,
        );
        let store = StrategyStore::from_config(
            &config.store,
            Duration::from_millis(config.feeds.timeout_ms),
        )?;
        Ok(Self::new(market, selector, store, &config.selection))
    }

    pub fn store(&self) -> &StrategyStore {
        &self.store
    }

    fn lock_for(&self, tier: RiskTier) -> &Mutex<()> {
        match tier {
            RiskTier::Low => &self.low_lock,
            RiskTier::High => &self.high_lock,
        }
    }

    /// Run one decision cycle for `tier`
    pub async fn run_cycle(&self, tier: RiskTier) -> Result<CycleOutcome> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", %cycle_id, %tier);

        async move {
            let _guard = self.lock_for(tier).lock().await;
            let outcome = self.execute_cycle(tier).await;
            match &outcome {
                Ok(CycleOutcome::Persisted(_)) => info!(outcome = "persisted", "Cycle complete"),
                Ok(CycleOutcome::NoEligiblePool { .. }) => {
                    info!(outcome = "no_eligible_pool", "Cycle complete")
                }
                Err(e) if e.aborts_cycle() => {
                    warn!(outcome = "failed", "Cycle aborted: {}", e)
                }
                Err(e) => error!(outcome = "failed", "Cycle failed: {}", e),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute_cycle(&self, tier: RiskTier) -> Result<CycleOutcome> {
        let signal = self
            .trend
            .signal(&self.reference_asset, self.lookback_days)
            .await?;
        debug!(
            reference_asset = %signal.reference_asset,
            window_days = signal.window_days,
            sampled_at = %signal.sampled_at,
            "{} is in {}",
            signal.reference_asset,
            signal.direction
        );
        let trend = signal.direction;

        let pools = self.market.fetch_pools().await?;
        let Some(best) = self.selector.select_best(tier, &pools) else {
            warn!(
                "No {} pool qualifies among {} listings",
                self.selector.target_asset(),
                pools.len()
            );
            return Ok(CycleOutcome::NoEligiblePool { trend });
        };

        if let Some(classified) = self
            .selector
            .classifier()
            .annotate(std::slice::from_ref(&best))
            .first()
        {
            info!(
                pool = %best.pool_id,
                protocol = %best.protocol,
                apy = best.apy,
                risk_score = classified.risk_score,
                allocation_hint_pct = classified.allocation_hint_pct(),
                strategy_id = classified.strategy_id,
                "Selected pool"
            );
        }

        let decision = self.selector.build_decision(tier, trend, Some(best));
        self.store.put(tier, &decision).await?;
        Ok(CycleOutcome::Persisted(decision))
    }

    /// Run one cycle per tier concurrently; tiers do not block each other
    pub async fn run_all(&self, tiers: &[RiskTier]) -> Vec<(RiskTier, Result<CycleOutcome>)> {
        let results = join_all(tiers.iter().map(|tier| self.run_cycle(*tier))).await;
        tiers.iter().copied().zip(results).collect()
    }

    /// Run cycles for `tiers` every `interval` until `shutdown` fires
    pub async fn run_scheduled(
        &self,
        interval: Duration,
        tiers: &[RiskTier],
        shutdown: CancellationToken,
    ) {
        info!(
            "Starting strategy scheduler (interval: {}s, tiers: {:?})",
            interval.as_secs(),
            tiers
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for (tier, result) in self.run_all(tiers).await {
                        if let Err(e) = result {
                            error!("{} tier cycle failed: {}", tier, e);
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Strategy scheduler shutting down");
                    break;
                }
            }
        }
    }
}
