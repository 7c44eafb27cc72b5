//! Configuration loading and validation

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::market::{COINGECKO_BASE, DEFILLAMA_YIELDS_BASE};
use crate::strategy::RiskTier;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feeds: FeedConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External yield and price feeds
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_yield_base_url")]
    pub yield_base_url: String,
    #[serde(default = "default_price_base_url")]
    pub price_base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Drop pools whose `status` is present and not "active"
    #[serde(default = "default_true")]
    pub require_active_status: bool,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            yield_base_url: default_yield_base_url(),
            price_base_url: default_price_base_url(),
            timeout_ms: default_timeout_ms(),
            require_active_status: true,
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Pool selection and trend settings
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    /// Asset symbol candidates must be denominated in
    #[serde(default = "default_target_asset")]
    pub target_asset: String,
    /// Price feed id of the trend reference asset
    #[serde(default = "default_reference_asset")]
    pub reference_asset: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<RiskTier>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            target_asset: default_target_asset(),
            reference_asset: default_reference_asset(),
            lookback_days: default_lookback_days(),
            cycle_interval_secs: default_cycle_interval_secs(),
            tiers: default_tiers(),
        }
    }
}

/// Protocol risk classification table
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_protocols")]
    pub protocols: HashMap<String, RiskTier>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            protocols: default_protocols(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    /// One JSON document per key on local disk
    File,
    /// Managed key-value service over HTTP
    Remote,
    /// Process-local, lost on exit
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackendKind,
    #[serde(default = "default_store_dir")]
    pub dir: String,
    #[serde(default)]
    pub remote_url: String,
    #[serde(default)]
    pub remote_token: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            dir: default_store_dir(),
            remote_url: String::new(),
            remote_token: String::new(),
        }
    }
}

/// On-chain vault and strategy manager
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_vault_address")]
    pub vault_address: String,
    #[serde(default = "default_strategy_manager_address")]
    pub strategy_manager_address: String,
    #[serde(default = "default_low_risk_venue")]
    pub low_risk_venue: String,
    #[serde(default = "default_high_risk_venue")]
    pub high_risk_venue: String,
    /// Name of the environment variable holding the signing key
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            vault_address: default_vault_address(),
            strategy_manager_address: default_strategy_manager_address(),
            low_risk_venue: default_low_risk_venue(),
            high_risk_venue: default_high_risk_venue(),
            private_key_env: default_private_key_env(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_yield_base_url() -> String {
    DEFILLAMA_YIELDS_BASE.into()
}

fn default_price_base_url() -> String {
    COINGECKO_BASE.into()
}

fn default_timeout_ms() -> u64 {
    10000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_target_asset() -> String {
    "usdc".into()
}

fn default_reference_asset() -> String {
    "usd-coin".into()
}

fn default_lookback_days() -> u32 {
    25
}

fn default_cycle_interval_secs() -> u64 {
    900
}

fn default_tiers() -> Vec<RiskTier> {
    RiskTier::ALL.to_vec()
}

fn default_protocols() -> HashMap<String, RiskTier> {
    [
        ("compound", RiskTier::Low),
        ("aave", RiskTier::Low),
        ("lido", RiskTier::Low),
        ("makerdao", RiskTier::Low),
        ("uniswap", RiskTier::High),
        ("aerodrome-slipstream", RiskTier::High),
        ("pendle", RiskTier::High),
    ]
    .into_iter()
    .map(|(name, tier)| (name.to_string(), tier))
    .collect()
}

fn default_store_backend() -> StoreBackendKind {
    StoreBackendKind::File
}

fn default_store_dir() -> String {
    ".local-kv".into()
}

fn env_or_empty(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn default_rpc_url() -> String {
    std::env::var("SEPOLIA_RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".into())
}

fn default_vault_address() -> String {
    env_or_empty("VAULT_ADDRESS")
}

fn default_strategy_manager_address() -> String {
    env_or_empty("STRATEGY_MANAGER_ADDRESS")
}

fn default_low_risk_venue() -> String {
    env_or_empty("LOW_RISK_STRATEGY_ADDRESS")
}

fn default_high_risk_venue() -> String {
    env_or_empty("HIGH_RISK_STRATEGY_ADDRESS")
}

fn default_private_key_env() -> String {
    "PRIVATE_KEY".into()
}

fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix YIELDBOT_)
            .add_source(
                config::Environment::with_prefix("YIELDBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.feeds.yield_base_url)
            .with_context(|| format!("feeds.yield_base_url is not a URL: {}", self.feeds.yield_base_url))?;
        url::Url::parse(&self.feeds.price_base_url)
            .with_context(|| format!("feeds.price_base_url is not a URL: {}", self.feeds.price_base_url))?;

        if self.feeds.retry_attempts == 0 {
            anyhow::bail!("feeds.retry_attempts must be at least 1");
        }

        if self.selection.target_asset.trim().is_empty() {
            anyhow::bail!("selection.target_asset must not be empty");
        }

        if self.selection.lookback_days == 0 {
            anyhow::bail!("selection.lookback_days must be positive");
        }

        if self.selection.cycle_interval_secs == 0 {
            anyhow::bail!("selection.cycle_interval_secs must be positive");
        }

        if self.selection.tiers.is_empty() {
            anyhow::bail!("selection.tiers must name at least one tier");
        }

        if self.risk.protocols.keys().any(|name| name.trim().is_empty()) {
            anyhow::bail!("risk.protocols contains an empty protocol name");
        }

        if self.store.backend == StoreBackendKind::Remote {
            url::Url::parse(&self.store.remote_url)
                .with_context(|| format!("store.remote_url is not a URL: {:?}", self.store.remote_url))?;
        }

        // Addresses are optional until a ledger command needs them, but must parse when set
        for (field, value) in [
            ("ledger.vault_address", &self.ledger.vault_address),
            ("ledger.strategy_manager_address", &self.ledger.strategy_manager_address),
            ("ledger.low_risk_venue", &self.ledger.low_risk_venue),
            ("ledger.high_risk_venue", &self.ledger.high_risk_venue),
        ] {
            if !value.is_empty() {
                parse_address(field, value)?;
            }
        }

        if !self.ledger.low_risk_venue.is_empty()
            && self.ledger.low_risk_venue.eq_ignore_ascii_case(&self.ledger.high_risk_venue)
        {
            anyhow::bail!("ledger.low_risk_venue and ledger.high_risk_venue must differ");
        }

        Ok(())
    }

    /// Settings that load fine but are probably a mistake
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.feeds.timeout_ms < 1000 {
            warnings.push(format!(
                "feeds.timeout_ms is {}ms, feeds routinely take longer than a second",
                self.feeds.timeout_ms
            ));
        }
        warnings
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let mut protocols: Vec<_> = self
            .risk
            .protocols
            .iter()
            .map(|(name, tier)| format!("{}={}", name, tier))
            .collect();
        protocols.sort();

        format!(
            r#"Configuration:
  Feeds:
    yields: {}
    prices: {}
    timeout: {}ms
    require_active_status: {}
    retry_attempts: {}
  Selection:
    target_asset: {}
    reference_asset: {}
    lookback: {} days
    cycle_interval: {}s
    tiers: {:?}
  Risk:
    protocols: {}
  Store:
    backend: {:?}
    dir: {}
    remote_url: {}
    remote_token: {}
  Ledger:
    rpc_url: {}
    vault: {}
    strategy_manager: {}
    low_risk_venue: {}
    high_risk_venue: {}
    signing key: {}
"#,
            mask_url(&self.feeds.yield_base_url),
            mask_url(&self.feeds.price_base_url),
            self.feeds.timeout_ms,
            self.feeds.require_active_status,
            self.feeds.retry_attempts,
            self.selection.target_asset,
            self.selection.reference_asset,
            self.selection.lookback_days,
            self.selection.cycle_interval_secs,
            self.selection.tiers,
            protocols.join(", "),
            self.store.backend,
            self.store.dir,
            mask_url(&self.store.remote_url),
            if self.store.remote_token.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            mask_url(&self.ledger.rpc_url),
            or_unset(&self.ledger.vault_address),
            or_unset(&self.ledger.strategy_manager_address),
            or_unset(&self.ledger.low_risk_venue),
            or_unset(&self.ledger.high_risk_venue),
            if std::env::var(&self.ledger.private_key_env).is_ok() {
                format!("${} (set)", self.ledger.private_key_env)
            } else {
                format!("${} (not set)", self.ledger.private_key_env)
            },
        )
    }
}

/// Parse a configured address, naming the field on failure
pub fn parse_address(field: &str, value: &str) -> crate::error::Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|_| crate::error::Error::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// Mask URL for display (hide API keys in path or query params)
pub fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else if url.contains("/v2/") || url.contains("infura.io/v3/") {
        // Alchemy/Infura style keys live in the last path segment
        match url.rfind('/') {
            Some(idx) => format!("{}/***", &url[..idx]),
            None => url.to_string(),
        }
    } else {
        url.to_string()
    }
}
