//! Price history client (CoinGecko-style `market_chart` endpoint)

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::types::PriceSample;
use crate::error::{Error, Result};

pub const COINGECKO_BASE: &str = "https://api.coingecko.com/api/v3";

const FEED: &str = "price";

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<serde_json::Value>,
}

/// Parse one `[timestamp, price]` pair
fn parse_pair(pair: &serde_json::Value) -> Option<PriceSample> {
    let items = pair.as_array()?;
    if items.len() < 2 {
        return None;
    }
    let timestamp_ms = items[0].as_f64()? as i64;
    let price = items[1].as_f64()?;
    if !price.is_finite() {
        return None;
    }
    Some(PriceSample {
        timestamp_ms,
        price,
    })
}

/// Client for reference-asset price history
pub struct PriceFeedClient {
    client: reqwest::Client,
    base_url: String,
}

impl PriceFeedClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch USD price history for `asset_id` over the last `days` days,
    /// ordered oldest first
    pub async fn fetch_price_history(&self, asset_id: &str, days: u32) -> Result<Vec<PriceSample>> {
        if asset_id.is_empty() || asset_id.contains('/') {
            return Err(Error::Config(format!("Invalid price feed asset id: {:?}", asset_id)));
        }

        let url = format!("{}/coins/{}/market_chart", self.base_url, asset_id);
        debug!("GET {} (days={})", url, days);

        let resp = self
            .client
            .get(&url)
            .query(&[("vs_currency", "usd".to_string()), ("days", days.to_string())])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::upstream(FEED, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::upstream(FEED, format!("HTTP {}: {}", status, text)));
        }

        let chart: MarketChart = resp
            .json()
            .await
            .map_err(|e| Error::upstream(FEED, format!("unreadable body: {}", e)))?;

        let mut samples: Vec<PriceSample> = chart.prices.iter().filter_map(parse_pair).collect();
        // Upstream order is not trusted; stable so equal timestamps keep feed order
        samples.sort_by_key(|s| s.timestamp_ms);

        debug!("Fetched {} price samples for {}", samples.len(), asset_id);
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_price_history_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/usd-coin/market_chart"))
            .and(query_param("vs_currency", "usd"))
            .and(query_param("days", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "prices": [[3000, 1.002], [1000, 0.999], [2000, 1.0], ["bad"], [4000, null]],
                "market_caps": [],
                "total_volumes": []
            })))
            .mount(&server)
            .await;

        let client = PriceFeedClient::new(server.uri(), Duration::from_secs(5));
        let samples = client.fetch_price_history("usd-coin", 25).await.unwrap();

        let timestamps: Vec<i64> = samples.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(timestamps, vec![1000, 2000, 3000]);
        assert_eq!(samples[2].price, 1.002);
    }

    #[tokio::test]
    async fn test_rate_limited_is_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = PriceFeedClient::new(server.uri(), Duration::from_secs(5));
        let err = client.fetch_price_history("usd-coin", 25).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_rejects_path_like_asset_id() {
        let client = PriceFeedClient::new(COINGECKO_BASE, Duration::from_secs(5));
        assert!(matches!(
            client.fetch_price_history("../admin", 25).await,
            Err(Error::Config(_))
        ));
    }
}
