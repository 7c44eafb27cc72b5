//! Normalized market records shared by the feeds and the strategy layer

use serde::{Deserialize, Serialize};

/// One yield opportunity, normalized from the yield feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolCandidate {
    /// Opaque pool identifier from the feed
    pub pool_id: String,
    /// Lowercase project name, used for risk classification
    pub protocol: String,
    /// Lowercase symbol of the underlying asset
    pub asset: String,
    /// Annualized yield as reported by the feed
    pub apy: f64,
    /// Total value locked in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvl: Option<f64>,
}

impl PoolCandidate {
    /// A pool is rankable only with a finite, strictly positive yield
    pub fn has_positive_yield(&self) -> bool {
        self.apy.is_finite() && self.apy > 0.0
    }
}

/// A single (timestamp, price) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Epoch milliseconds
    pub timestamp_ms: i64,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_yield() {
        let mut pool = PoolCandidate {
            pool_id: "p1".into(),
            protocol: "aave-v3".into(),
            asset: "usdc".into(),
            apy: 0.045,
            tvl: None,
        };
        assert!(pool.has_positive_yield());

        pool.apy = 0.0;
        assert!(!pool.has_positive_yield());

        pool.apy = f64::NAN;
        assert!(!pool.has_positive_yield());
    }

    #[test]
    fn test_tvl_omitted_when_absent() {
        let pool = PoolCandidate {
            pool_id: "p1".into(),
            protocol: "aave-v3".into(),
            asset: "usdc".into(),
            apy: 4.5,
            tvl: None,
        };
        let json = serde_json::to_value(&pool).unwrap();
        assert!(json.get("tvl").is_none());
        assert_eq!(json["poolId"], "p1");
    }
}
