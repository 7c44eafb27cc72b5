//! Strategy Store
//!
//! Latest decision per risk tier, keyed `strategy:{tier}`. Writes overwrite;
//! no history is kept. The backend is pluggable: a local directory of JSON
//! files, a remote key-value service, or process memory.

pub mod file;
pub mod memory;
pub mod remote;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{StoreBackendKind, StoreConfig};
use crate::error::{Error, Result};
use crate::strategy::{RiskTier, StrategyDecision};

pub use file::FileKvBackend;
pub use memory::MemoryKvBackend;
pub use remote::HttpKvBackend;

/// Raw string key-value storage
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Value under `key`, `None` if never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Short backend label for logs
    fn describe(&self) -> String;
}

#[derive(Clone)]
pub struct StrategyStore {
    backend: Arc<dyn KvBackend>,
}

impl StrategyStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvBackend::new()))
    }

    pub fn from_config(config: &StoreConfig, timeout: Duration) -> Result<Self> {
        let backend: Arc<dyn KvBackend> = match config.backend {
            StoreBackendKind::File => Arc::new(FileKvBackend::new(&config.dir)),
            StoreBackendKind::Memory => Arc::new(MemoryKvBackend::new()),
            StoreBackendKind::Remote => {
                if config.remote_url.is_empty() {
                    return Err(Error::Config(
                        "store.remote_url is required for the remote backend".into(),
                    ));
                }
                let token = (!config.remote_token.is_empty()).then(|| config.remote_token.clone());
                Arc::new(HttpKvBackend::new(&config.remote_url, token, timeout))
            }
        };
        Ok(Self::new(backend))
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Latest decision for `tier`, `None` if no cycle has persisted one
    pub async fn get(&self, tier: RiskTier) -> Result<Option<StrategyDecision>> {
        let key = tier.store_key();
        match self.backend.get(&key).await? {
            Some(raw) => {
                let decision = serde_json::from_str(&raw)
                    .map_err(|e| Error::Store(format!("corrupt value under {}: {}", key, e)))?;
                Ok(Some(decision))
            }
            None => Ok(None),
        }
    }

    /// Overwrite the decision stored for `tier`
    pub async fn put(&self, tier: RiskTier, decision: &StrategyDecision) -> Result<()> {
        if decision.risk_tier != tier {
            return Err(Error::Store(format!(
                "{} decision cannot be stored under the {} tier",
                decision.risk_tier, tier
            )));
        }
        let key = tier.store_key();
        let raw = serde_json::to_string_pretty(decision)?;
        self.backend.set(&key, &raw).await?;
        debug!("Stored {} via {}", key, self.backend.describe());
        Ok(())
    }
}
