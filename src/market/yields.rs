//! Yield feed client (DefiLlama-style `/pools` endpoint)
//!
//! Normalizes the raw pool listing into [`PoolCandidate`] records. Entries
//! that fail to parse are dropped, never defaulted.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::types::PoolCandidate;
use crate::error::{Error, Result};

pub const DEFILLAMA_YIELDS_BASE: &str = "https://yields.llama.fi";

const FEED: &str = "yield";

/// Raw pool as returned by the feed. Only the fields we read are modelled.
#[derive(Debug, Clone, Deserialize)]
struct RawPool {
    pool: String,
    project: String,
    symbol: String,
    #[serde(rename = "apyBase", default)]
    apy_base: Option<serde_json::Value>,
    #[serde(rename = "tvlUsd", default)]
    tvl_usd: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<String>,
}

/// The feed either wraps the listing (`{"status": .., "data": [..]}`) or
/// returns it bare, depending on the endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoolsEnvelope {
    Wrapped { data: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

impl PoolsEnvelope {
    fn into_entries(self) -> Vec<serde_json::Value> {
        match self {
            PoolsEnvelope::Wrapped { data } => data,
            PoolsEnvelope::Bare(entries) => entries,
        }
    }
}

/// Read a JSON number, or a string holding one
fn parse_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Normalize one raw entry, or drop it
fn normalize(entry: serde_json::Value, require_active_status: bool) -> Option<PoolCandidate> {
    let raw: RawPool = match serde_json::from_value(entry) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("Dropping malformed pool entry: {}", e);
            return None;
        }
    };

    let apy = raw.apy_base.as_ref().and_then(parse_number)?;
    if !apy.is_finite() || apy < 0.0 {
        debug!("Dropping pool {} with invalid apy {}", raw.pool, apy);
        return None;
    }

    // Only applied when the feed actually carries a status field
    if require_active_status {
        if let Some(status) = &raw.status {
            if status != "active" || apy <= 0.0 {
                return None;
            }
        }
    }

    let protocol = raw.project.trim().to_lowercase();
    let asset = raw.symbol.trim().to_lowercase();
    if raw.pool.is_empty() || protocol.is_empty() || asset.is_empty() {
        return None;
    }

    Some(PoolCandidate {
        pool_id: raw.pool,
        protocol,
        asset,
        apy,
        tvl: raw
            .tvl_usd
            .as_ref()
            .and_then(parse_number)
            .filter(|tvl| tvl.is_finite() && *tvl >= 0.0),
    })
}

/// Client for the yield pool listing
pub struct YieldFeedClient {
    client: reqwest::Client,
    base_url: String,
    require_active_status: bool,
}

impl YieldFeedClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, require_active_status: bool) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            require_active_status,
        }
    }

    /// Fetch and normalize every pool in the listing
    pub async fn fetch_pools(&self) -> Result<Vec<PoolCandidate>> {
        let url = format!("{}/pools", self.base_url);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::upstream(FEED, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::upstream(FEED, format!("HTTP {}: {}", status, text)));
        }

        let envelope: PoolsEnvelope = resp
            .json()
            .await
            .map_err(|e| Error::upstream(FEED, format!("unreadable body: {}", e)))?;

        let entries = envelope.into_entries();
        let total = entries.len();
        let pools: Vec<PoolCandidate> = entries
            .into_iter()
            .filter_map(|entry| normalize(entry, self.require_active_status))
            .collect();

        info!("Fetched {} pools ({} dropped)", pools.len(), total - pools.len());
        Ok(pools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, require_active_status: bool) -> YieldFeedClient {
        YieldFeedClient::new(server.uri(), Duration::from_secs(5), require_active_status)
    }

    #[test]
    fn test_normalize_lowercases_and_keeps_tvl() {
        let pool = normalize(
            json!({"pool": "abc", "project": "Aave-V3", "symbol": "USDC", "apyBase": 4.2, "tvlUsd": 1000.5}),
            true,
        )
        .unwrap();
        assert_eq!(pool.protocol, "aave-v3");
        assert_eq!(pool.asset, "usdc");
        assert_eq!(pool.apy, 4.2);
        assert_eq!(pool.tvl, Some(1000.5));
    }

    #[test]
    fn test_normalize_drops_unparsable_yield() {
        let entry = json!({"pool": "abc", "project": "aave", "symbol": "usdc", "apyBase": "n/a"});
        assert!(normalize(entry, true).is_none());

        let entry = json!({"pool": "abc", "project": "aave", "symbol": "usdc", "apyBase": null});
        assert!(normalize(entry, true).is_none());

        let entry = json!({"pool": "abc", "project": "aave", "symbol": "usdc", "apyBase": -1.0});
        assert!(normalize(entry, true).is_none());
    }

    #[test]
    fn test_normalize_accepts_numeric_string() {
        let entry = json!({"pool": "abc", "project": "aave", "symbol": "usdc", "apyBase": "0.05"});
        assert_eq!(normalize(entry, true).unwrap().apy, 0.05);
    }

    #[test]
    fn test_status_filter_only_when_present() {
        let inactive = json!({"pool": "a", "project": "aave", "symbol": "usdc", "apyBase": 3.0, "status": "paused"});
        assert!(normalize(inactive.clone(), true).is_none());
        assert!(normalize(inactive, false).is_some());

        let zero_active = json!({"pool": "b", "project": "aave", "symbol": "usdc", "apyBase": 0.0, "status": "active"});
        assert!(normalize(zero_active, true).is_none());

        // No status field: no status filtering, zero yield survives to the selector
        let no_status = json!({"pool": "c", "project": "aave", "symbol": "usdc", "apyBase": 0.0});
        assert!(normalize(no_status, true).is_some());
    }

    #[tokio::test]
    async fn test_fetch_pools_wrapped_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": [
                    {"pool": "p1", "project": "aave", "symbol": "USDC", "apyBase": 0.03},
                    {"pool": "p2", "project": "pendle", "symbol": "USDC", "apyBase": 0.20},
                    {"project": "broken"}
                ]
            })))
            .mount(&server)
            .await;

        let pools = client(&server, true).fetch_pools().await.unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[1].pool_id, "p2");
    }

    #[tokio::test]
    async fn test_fetch_pools_bare_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"pool": "p1", "project": "lido", "symbol": "stETH", "apyBase": 3.1}
            ])))
            .mount(&server)
            .await;

        let pools = client(&server, true).fetch_pools().await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].asset, "steth");
    }

    #[tokio::test]
    async fn test_fetch_pools_non_success_is_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pools"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server, true).fetch_pools().await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_fetch_pools_garbage_body_is_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pools"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server, true).fetch_pools().await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable { .. }));
    }
}
