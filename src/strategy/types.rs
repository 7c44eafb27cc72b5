//! Shared types for strategy selection
//!
//! Risk tiers, trend signals and the persisted decision record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;
use crate::market::PoolCandidate;

/// Coarse risk bucket for yield venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    High,
}

impl RiskTier {
    /// Every tier, in a fixed order
    pub const ALL: [RiskTier; 2] = [RiskTier::Low, RiskTier::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::High => "high",
        }
    }

    /// Key under which the latest decision for this tier is stored
    pub fn store_key(&self) -> String {
        format!("strategy:{}", self.as_str())
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskTier::Low),
            "high" => Ok(RiskTier::High),
            _ => Err(Error::InvalidRequest {
                field: "risk".to_string(),
                message: format!("Risk level must be 'low' or 'high'. Received: {}", s),
            }),
        }
    }
}

/// Direction of the reference asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
}

impl TrendDirection {
    pub fn from_downtrend(downtrend: bool) -> Self {
        if downtrend {
            TrendDirection::Downtrend
        } else {
            TrendDirection::Uptrend
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Uptrend => write!(f, "uptrend"),
            TrendDirection::Downtrend => write!(f, "downtrend"),
        }
    }
}

/// Trend of a reference asset over a lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSignal {
    pub direction: TrendDirection,
    pub reference_asset: String,
    pub window_days: u32,
    pub sampled_at: DateTime<Utc>,
}

/// The persisted outcome of one decision cycle
///
/// Immutable once written; the next cycle for the same tier replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDecision {
    /// Creation time, epoch milliseconds
    pub timestamp: i64,
    pub risk_tier: RiskTier,
    pub trend: TrendDirection,
    pub selected_pool: Option<PoolCandidate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_tier_parse() {
        assert_eq!("low".parse::<RiskTier>().unwrap(), RiskTier::Low);
        assert_eq!(" HIGH ".parse::<RiskTier>().unwrap(), RiskTier::High);

        let err = "medium".parse::<RiskTier>().unwrap_err();
        assert!(err
            .to_string()
            .contains("Risk level must be 'low' or 'high'. Received: medium"));
    }

    #[test]
    fn test_store_key() {
        assert_eq!(RiskTier::Low.store_key(), "strategy:low");
        assert_eq!(RiskTier::High.store_key(), "strategy:high");
    }

    #[test]
    fn test_decision_json_shape() {
        let decision = StrategyDecision {
            timestamp: 1_700_000_000_000,
            risk_tier: RiskTier::High,
            trend: TrendDirection::Downtrend,
            selected_pool: None,
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["riskTier"], "high");
        assert_eq!(json["trend"], "downtrend");
        assert!(json["selectedPool"].is_null());
    }
}
