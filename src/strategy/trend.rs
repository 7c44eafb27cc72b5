//! Trend Detector
//!
//! Three-point downtrend check on a reference asset. Let `current` be the
//! latest sample, `recent` the sample seven positions before it (index
//! `len - 8`) and `start` the first sample of the window. The asset is in a
//! downtrend iff `current < recent && current < start`.

use chrono::Utc;
use std::sync::Arc;

use super::types::{TrendDirection, TrendSignal};
use crate::error::{Error, Result};
use crate::market::MarketData;

/// Fewest samples the three-point check can run on
pub const MIN_TREND_SAMPLES: usize = 8;

/// Pure downtrend check over an ordered price series (oldest first)
pub fn detect_downtrend(prices: &[f64]) -> Result<bool> {
    let len = prices.len();
    if len < MIN_TREND_SAMPLES {
        return Err(Error::InsufficientHistory {
            required: MIN_TREND_SAMPLES,
            available: len,
        });
    }

    let current = prices[len - 1];
    let recent = prices[len - 8];
    let start = prices[0];

    Ok(current < recent && current < start)
}

pub struct TrendDetector {
    market: Arc<dyn MarketData>,
}

impl TrendDetector {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }

    /// Whether `asset_id` is in a downtrend over the last `window_days`
    pub async fn is_downtrend(&self, asset_id: &str, window_days: u32) -> Result<bool> {
        let samples = self.market.fetch_price_history(asset_id, window_days).await?;
        let prices: Vec<f64> = samples.iter().map(|s| s.price).collect();
        detect_downtrend(&prices)
    }

    /// Full trend signal for the decision record
    pub async fn signal(&self, asset_id: &str, window_days: u32) -> Result<TrendSignal> {
        let downtrend = self.is_downtrend(asset_id, window_days).await?;
        Ok(TrendSignal {
            direction: TrendDirection::from_downtrend(downtrend),
            reference_asset: asset_id.to_string(),
            window_days,
            sampled_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{PoolCandidate, PriceSample};
    use async_trait::async_trait;

    struct FixedPrices(Vec<f64>);

    #[async_trait]
    impl MarketData for FixedPrices {
        async fn fetch_pools(&self) -> Result<Vec<PoolCandidate>> {
            Ok(vec![])
        }

        async fn fetch_price_history(&self, _asset_id: &str, _days: u32) -> Result<Vec<PriceSample>> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, price)| PriceSample {
                    timestamp_ms: i as i64 * 86_400_000,
                    price: *price,
                })
                .collect())
        }
    }

    #[test]
    fn test_increasing_series_is_not_downtrend() {
        let prices: Vec<f64> = (0..25).map(|i| 1.0 + i as f64 * 0.01).collect();
        assert!(!detect_downtrend(&prices).unwrap());
    }

    #[test]
    fn test_decreasing_series_is_downtrend() {
        let prices: Vec<f64> = (0..25).map(|i| 2.0 - i as f64 * 0.01).collect();
        assert!(detect_downtrend(&prices).unwrap());
    }

    #[test]
    fn test_exactly_eight_samples() {
        // recent and start are the same sample at len 8
        assert!(detect_downtrend(&[1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 0.5]).unwrap());
        assert!(!detect_downtrend(&[0.4, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 0.5]).unwrap());
    }

    #[test]
    fn test_seven_samples_is_insufficient() {
        let err = detect_downtrend(&[1.0; 7]).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientHistory {
                required: 8,
                available: 7
            }
        ));
    }

    #[test]
    fn test_uses_len_minus_eight_not_seven() {
        // index len-8 = 2 holds 0.9 (below current), index len-7 = 3 holds 5.0
        let prices = [2.0, 2.0, 0.9, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 1.0];
        assert!(!detect_downtrend(&prices).unwrap());

        // Move the low to index 3 and the check now passes
        let prices = [2.0, 2.0, 5.0, 0.9, 5.0, 5.0, 5.0, 5.0, 5.0, 1.0];
        assert!(detect_downtrend(&prices).unwrap());
    }

    #[test]
    fn test_equal_prices_are_not_downtrend() {
        assert!(!detect_downtrend(&[1.0; 10]).unwrap());
    }

    #[tokio::test]
    async fn test_signal_from_market() {
        let market = Arc::new(FixedPrices((0..10).map(|i| 10.0 - i as f64).collect()));
        let detector = TrendDetector::new(market);

        let signal = detector.signal("usd-coin", 25).await.unwrap();
        assert_eq!(signal.direction, TrendDirection::Downtrend);
        assert_eq!(signal.reference_asset, "usd-coin");
        assert_eq!(signal.window_days, 25);
    }

    #[tokio::test]
    async fn test_short_history_fails() {
        let detector = TrendDetector::new(Arc::new(FixedPrices(vec![1.0, 1.1])));
        assert!(matches!(
            detector.is_downtrend("usd-coin", 25).await,
            Err(Error::InsufficientHistory { .. })
        ));
    }
}
