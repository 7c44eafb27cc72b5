//! Market data aggregation
//!
//! Pulls yield-pool listings and reference price history from live feeds.
//! Nothing is cached here; every call hits the feed.

pub mod prices;
pub mod retry;
pub mod types;
pub mod yields;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::FeedConfig;
use crate::error::Result;

pub use prices::{PriceFeedClient, COINGECKO_BASE};
pub use retry::RetryingMarketData;
pub use types::{PoolCandidate, PriceSample};
pub use yields::{YieldFeedClient, DEFILLAMA_YIELDS_BASE};

/// Source of pool listings and price history
///
/// Both calls are single-shot and fail with `UpstreamUnavailable` when the
/// feed cannot be read. Wrap in [`RetryingMarketData`] for bounded retries.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// All pools currently listed by the yield feed, in no particular order
    async fn fetch_pools(&self) -> Result<Vec<PoolCandidate>>;

    /// Price samples for `asset_id` over the last `days` days, oldest first
    async fn fetch_price_history(&self, asset_id: &str, days: u32) -> Result<Vec<PriceSample>>;
}

/// Live feeds over HTTP
pub struct LiveMarketData {
    yields: YieldFeedClient,
    prices: PriceFeedClient,
}

impl LiveMarketData {
    pub fn new(yields: YieldFeedClient, prices: PriceFeedClient) -> Self {
        Self { yields, prices }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        Self::new(
            YieldFeedClient::new(&config.yield_base_url, timeout, config.require_active_status),
            PriceFeedClient::new(&config.price_base_url, timeout),
        )
    }

    /// Live feeds wrapped in the configured retry policy
    pub fn with_retry(config: &FeedConfig) -> RetryingMarketData<Self> {
        RetryingMarketData::new(
            Self::from_config(config),
            config.retry_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }
}

#[async_trait]
impl MarketData for LiveMarketData {
    async fn fetch_pools(&self) -> Result<Vec<PoolCandidate>> {
        self.yields.fetch_pools().await
    }

    async fn fetch_price_history(&self, asset_id: &str, days: u32) -> Result<Vec<PriceSample>> {
        self.prices.fetch_price_history(asset_id, days).await
    }
}
