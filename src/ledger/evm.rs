//! JSON-RPC ledger client for the vault and strategy manager contracts

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{Ledger, TxReceipt};
use crate::config::{mask_url, parse_address, LedgerConfig};
use crate::error::{Error, Result};

abigen!(
    Vault,
    r#"[
        function userDeposits(address user) external view returns (uint256)
        function allocateFunds(address user, uint256 amount, address strategy) external
        function getTotalValueLocked() external view returns (uint256)
    ]"#
);

abigen!(
    StrategyManager,
    r#"[
        function lowRiskStrategy() external view returns (address)
        function highRiskStrategy() external view returns (address)
        function setUserStrategy(address strategy) external
        function getUserStrategy(address user) external view returns (address)
    ]"#
);

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

fn ledger_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Ledger(format!("{}: {}", context, e))
}

/// Read the signing key from the environment variable `name`
pub fn load_wallet(name: &str) -> Result<LocalWallet> {
    let key = std::env::var(name).map_err(|_| Error::MissingEnvVar(name.to_string()))?;
    key.trim()
        .parse::<LocalWallet>()
        .map_err(|_| Error::Config(format!("{} does not hold a valid private key", name)))
}

pub struct EvmLedger {
    client: Arc<Client>,
    vault: Vault<Client>,
    manager: StrategyManager<Client>,
    confirmation_timeout: Duration,
}

impl EvmLedger {
    /// Connect to the configured RPC endpoint with the configured signer
    pub async fn connect(config: &LedgerConfig) -> Result<Self> {
        let vault_address = parse_address("ledger.vault_address", &config.vault_address)?;
        let manager_address = parse_address(
            "ledger.strategy_manager_address",
            &config.strategy_manager_address,
        )?;
        let wallet = load_wallet(&config.private_key_env)?;

        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| ledger_err("chain id", e))?;

        info!(
            "Connected to {} (chain {}), signer {:?}",
            mask_url(&config.rpc_url),
            chain_id,
            wallet.address()
        );

        let wallet = wallet.with_chain_id(chain_id.as_u64());
        let client = Arc::new(SignerMiddleware::new(provider, wallet));

        Ok(Self {
            vault: Vault::new(vault_address, client.clone()),
            manager: StrategyManager::new(manager_address, client.clone()),
            client,
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
        })
    }

    pub fn signer_address(&self) -> Address {
        self.client.address()
    }

    pub async fn block_number(&self) -> Result<u64> {
        self.client
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| ledger_err("block number", e))
    }

    pub async fn total_value_locked(&self) -> Result<U256> {
        self.vault
            .get_total_value_locked()
            .call()
            .await
            .map_err(|e| ledger_err("getTotalValueLocked", e))
    }

    /// Low and high risk venues as registered with the strategy manager
    pub async fn registered_venues(&self) -> Result<(Address, Address)> {
        let low = self
            .manager
            .low_risk_strategy()
            .call()
            .await
            .map_err(|e| ledger_err("lowRiskStrategy", e))?;
        let high = self
            .manager
            .high_risk_strategy()
            .call()
            .await
            .map_err(|e| ledger_err("highRiskStrategy", e))?;
        Ok((low, high))
    }

    async fn await_mined(
        &self,
        what: &str,
        pending: ethers::providers::PendingTransaction<'_, Http>,
    ) -> Result<TxReceipt> {
        let tx_hash = *pending;
        info!("{} sent: {:?}", what, tx_hash);

        let secs = self.confirmation_timeout.as_secs();
        let mined = tokio::time::timeout(self.confirmation_timeout, pending.confirmations(1))
            .await
            .map_err(|_| Error::LedgerTimeout(secs))?
            .map_err(|e| ledger_err(what, e))?
            .ok_or_else(|| Error::Ledger(format!("{} {:?} dropped from mempool", what, tx_hash)))?;

        let receipt = TxReceipt::from_mined(mined)?;
        info!("{} mined in block {:?}", what, receipt.block_number);
        Ok(receipt)
    }
}

#[async_trait]
impl Ledger for EvmLedger {
    async fn user_deposits(&self, user: Address) -> Result<U256> {
        self.vault
            .user_deposits(user)
            .call()
            .await
            .map_err(|e| ledger_err("userDeposits", e))
    }

    async fn allocate_funds(&self, user: Address, amount: U256, venue: Address) -> Result<TxReceipt> {
        debug!("allocateFunds({:?}, {}, {:?})", user, amount, venue);
        let call = self.vault.allocate_funds(user, amount, venue);
        let pending = call.send().await.map_err(|e| ledger_err("allocateFunds", e))?;
        self.await_mined("allocateFunds", pending).await
    }

    async fn set_user_strategy(&self, venue: Address) -> Result<TxReceipt> {
        let call = self.manager.set_user_strategy(venue);
        let pending = call
            .send()
            .await
            .map_err(|e| ledger_err("setUserStrategy", e))?;
        self.await_mined("setUserStrategy", pending).await
    }

    async fn get_user_strategy(&self, user: Address) -> Result<Address> {
        self.manager
            .get_user_strategy(user)
            .call()
            .await
            .map_err(|e| ledger_err("getUserStrategy", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_env() {
        let err = load_wallet("YIELDBOT_TEST_KEY_NEVER_SET").unwrap_err();
        assert!(matches!(err, Error::MissingEnvVar(name) if name == "YIELDBOT_TEST_KEY_NEVER_SET"));
    }

    #[test]
    fn test_invalid_key_is_not_echoed() {
        std::env::set_var("YIELDBOT_TEST_KEY_GARBAGE", "not-a-key");
        let err = load_wallet("YIELDBOT_TEST_KEY_GARBAGE").unwrap_err();
        assert!(!err.to_string().contains("not-a-key"));
    }

    #[test]
    fn test_valid_key() {
        // Well-known development key, never funded
        std::env::set_var(
            "YIELDBOT_TEST_KEY_VALID",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        );
        let wallet = load_wallet("YIELDBOT_TEST_KEY_VALID").unwrap();
        assert_eq!(
            wallet.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_vault_address() {
        let config = LedgerConfig {
            vault_address: "0x123".into(),
            ..Default::default()
        };
        assert!(matches!(
            EvmLedger::connect(&config).await,
            Err(Error::InvalidAddress { .. })
        ));
    }
}
