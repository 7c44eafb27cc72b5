//! Strategy Selector
//!
//! Picks the highest-yield pool for a tier and wraps it, with the current
//! trend, into a decision record.

use chrono::Utc;
use std::cmp::Ordering;
use tracing::debug;

use super::classifier::RiskClassifier;
use super::types::{RiskTier, StrategyDecision, TrendDirection};
use crate::market::PoolCandidate;

pub struct StrategySelector {
    classifier: RiskClassifier,
    target_asset: String,
}

impl StrategySelector {
    pub fn new(classifier: RiskClassifier, target_asset: impl Into<String>) -> Self {
        Self {
            classifier,
            target_asset: target_asset.into().to_lowercase(),
        }
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    pub fn target_asset(&self) -> &str {
        &self.target_asset
    }

    /// Whether a pool is eligible for `tier`
    pub fn is_eligible(&self, tier: RiskTier, pool: &PoolCandidate) -> bool {
        self.classifier.classify(&pool.protocol) == Some(tier)
            && pool.asset.eq_ignore_ascii_case(&self.target_asset)
            && pool.has_positive_yield()
    }

    /// Highest-APY eligible pool, first in feed order on ties
    pub fn select_best(&self, tier: RiskTier, pools: &[PoolCandidate]) -> Option<PoolCandidate> {
        let mut eligible: Vec<&PoolCandidate> =
            pools.iter().filter(|p| self.is_eligible(tier, p)).collect();

        debug!(
            "{} of {} pools eligible for {} tier",
            eligible.len(),
            pools.len(),
            tier
        );

        // Stable sort keeps feed order among equal APYs
        eligible.sort_by(|a, b| b.apy.partial_cmp(&a.apy).unwrap_or(Ordering::Equal));
        eligible.first().map(|p| (*p).clone())
    }

    /// Build the decision record for one cycle
    pub fn build_decision(
        &self,
        tier: RiskTier,
        trend: TrendDirection,
        best: Option<PoolCandidate>,
    ) -> StrategyDecision {
        StrategyDecision {
            timestamp: Utc::now().timestamp_millis(),
            risk_tier: tier,
            trend,
            selected_pool: best,
        }
    }
}
