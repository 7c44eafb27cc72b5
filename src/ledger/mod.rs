//! On-chain ledger access
//!
//! The vault holds user deposits and moves them into strategy venues; the
//! strategy manager records which venue each user has opted into.

pub mod evm;

use async_trait::async_trait;
use ethers::types::{Address, TransactionReceipt, H256, U256};
use serde::Serialize;

use crate::error::{Error, Result};

pub use evm::EvmLedger;

/// Decimals of the vault's deposit token (USDC)
pub const DEPOSIT_TOKEN_DECIMALS: u32 = 6;

/// A mined, successful transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl TxReceipt {
    /// Accept a mined receipt, rejecting reverted transactions
    pub fn from_mined(receipt: TransactionReceipt) -> Result<Self> {
        if receipt.status.map(|s| s.as_u64()) == Some(0) {
            return Err(Error::Ledger(format!(
                "transaction {:?} reverted",
                receipt.transaction_hash
            )));
        }
        Ok(Self {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used,
        })
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Deposit balance the vault holds for `user`, in token base units
    async fn user_deposits(&self, user: Address) -> Result<U256>;

    /// Move `amount` of `user`'s deposit into `venue`; resolves once mined
    async fn allocate_funds(&self, user: Address, amount: U256, venue: Address) -> Result<TxReceipt>;

    /// Opt the signing account into `venue`
    async fn set_user_strategy(&self, venue: Address) -> Result<TxReceipt>;

    /// Venue `user` has opted into; the zero address when unset
    async fn get_user_strategy(&self, user: Address) -> Result<Address>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U64;

    #[test]
    fn test_receipt_success() {
        let mined = TransactionReceipt {
            transaction_hash: H256::repeat_byte(0xab),
            block_number: Some(U64::from(42)),
            gas_used: Some(U256::from(21_000)),
            status: Some(U64::from(1)),
            ..Default::default()
        };
        let receipt = TxReceipt::from_mined(mined).unwrap();
        assert_eq!(receipt.tx_hash, H256::repeat_byte(0xab));
        assert_eq!(receipt.block_number, Some(42));
        assert_eq!(receipt.gas_used, Some(U256::from(21_000)));
    }

    #[test]
    fn test_receipt_reverted() {
        let mined = TransactionReceipt {
            status: Some(U64::zero()),
            ..Default::default()
        };
        assert!(matches!(TxReceipt::from_mined(mined), Err(Error::Ledger(_))));
    }
}
