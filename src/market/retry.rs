//! Bounded retry around any [`MarketData`] source
//!
//! Exponential backoff with jitter. Only transient errors are retried; the
//! last error is surfaced once the attempt budget is spent.

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::types::{PoolCandidate, PriceSample};
use super::MarketData;
use crate::error::Result;

pub struct RetryingMarketData<M> {
    inner: M,
    max_attempts: u32,
    base_delay: Duration,
}

impl<M: MarketData> RetryingMarketData<M> {
    pub fn new(inner: M, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, what: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let backoff = ExponentialBackoff {
            initial_interval: self.base_delay,
            randomization_factor: 0.5,
            max_interval: self.base_delay * 8,
            max_elapsed_time: None,
            ..Default::default()
        };

        let max_attempts = self.max_attempts;
        let mut attempt = 0u32;

        retry(backoff, || {
            attempt += 1;
            let current = attempt;
            let fut = call();
            async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_retryable() && current < max_attempts => {
                        warn!(attempt = current, max_attempts, "Retrying {} fetch: {}", what, e);
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }
}

#[async_trait]
impl<M: MarketData> MarketData for RetryingMarketData<M> {
    async fn fetch_pools(&self) -> Result<Vec<PoolCandidate>> {
        self.with_retry("pools", || self.inner.fetch_pools()).await
    }

    async fn fetch_price_history(&self, asset_id: &str, days: u32) -> Result<Vec<PriceSample>> {
        self.with_retry("price history", || self.inner.fetch_price_history(asset_id, days))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times with the given error kind, then succeeds
    struct Flaky {
        failures: u32,
        retryable: bool,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, retryable: bool) -> Self {
            Self {
                failures,
                retryable,
                calls: AtomicU32::new(0),
            }
        }

        fn fail_or<T>(&self, value: T) -> Result<T> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if self.retryable {
                    Err(Error::upstream("yield", "connection reset"))
                } else {
                    Err(Error::Config("bad asset".into()))
                }
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl MarketData for Flaky {
        async fn fetch_pools(&self) -> Result<Vec<PoolCandidate>> {
            self.fail_or(vec![])
        }

        async fn fetch_price_history(&self, _asset_id: &str, _days: u32) -> Result<Vec<PriceSample>> {
            self.fail_or(vec![PriceSample {
                timestamp_ms: 1,
                price: 1.0,
            }])
        }
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let market = RetryingMarketData::new(Flaky::new(2, true), 3, Duration::from_millis(1));
        let samples = market.fetch_price_history("usd-coin", 25).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(market.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let market = RetryingMarketData::new(Flaky::new(10, true), 3, Duration::from_millis(1));
        let err = market.fetch_pools().await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable { .. }));
        assert_eq!(market.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let market = RetryingMarketData::new(Flaky::new(1, false), 5, Duration::from_millis(1));
        assert!(market.fetch_pools().await.is_err());
        assert_eq!(market.inner().calls.load(Ordering::SeqCst), 1);
    }
}
