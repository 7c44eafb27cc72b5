//! Allocation Executor
//!
//! Moves a user's vault deposit into one of the two configured venues.
//! Every call submits exactly one transaction; nothing is retried.

use ethers::types::{Address, U256};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{parse_address, LedgerConfig};
use crate::error::{Error, Result};
use crate::ledger::{Ledger, TxReceipt};
use crate::store::StrategyStore;
use crate::strategy::{RiskTier, StrategyDecision};

/// The two venues funds may be allocated to, one per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenueBook {
    pub low: Address,
    pub high: Address,
}

impl VenueBook {
    pub fn new(low: Address, high: Address) -> Self {
        Self { low, high }
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        Ok(Self::new(
            parse_address("ledger.low_risk_venue", &config.low_risk_venue)?,
            parse_address("ledger.high_risk_venue", &config.high_risk_venue)?,
        ))
    }

    pub fn venue_for(&self, tier: RiskTier) -> Address {
        match tier {
            RiskTier::Low => self.low,
            RiskTier::High => self.high,
        }
    }

    /// Tier served by `venue`, `None` for anything unlisted
    pub fn tier_for(&self, venue: Address) -> Option<RiskTier> {
        if venue == self.low {
            Some(RiskTier::Low)
        } else if venue == self.high {
            Some(RiskTier::High)
        } else {
            None
        }
    }
}

/// Result of a rebalance attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RebalanceOutcome {
    Allocated {
        tier: RiskTier,
        amount: U256,
        receipt: TxReceipt,
        decision: StrategyDecision,
    },
    /// No decision has been stored for the user's tier yet
    NoDecision { tier: RiskTier },
    /// The user has nothing deposited
    NothingToAllocate { tier: RiskTier },
}

pub struct AllocationExecutor {
    ledger: Arc<dyn Ledger>,
    venues: VenueBook,
}

impl AllocationExecutor {
    pub fn new(ledger: Arc<dyn Ledger>, venues: VenueBook) -> Self {
        Self { ledger, venues }
    }

    pub fn venues(&self) -> &VenueBook {
        &self.venues
    }

    /// Deposit the vault holds for `user`
    pub async fn current_deposit(&self, user: Address) -> Result<U256> {
        self.ledger.user_deposits(user).await
    }

    /// Allocate `amount` of `user`'s deposit to `venue` and wait for one
    /// confirmation
    pub async fn allocate(&self, user: Address, amount: U256, venue: Address) -> Result<TxReceipt> {
        if amount.is_zero() {
            return Err(Error::InvalidAmount("amount must be greater than zero".into()));
        }
        let tier = self
            .venues
            .tier_for(venue)
            .ok_or_else(|| Error::UnknownVenue(format!("{:?}", venue)))?;

        info!(
            "Allocating {} from {:?} to {} risk venue {:?}",
            amount, user, tier, venue
        );

        match self.ledger.allocate_funds(user, amount, venue).await {
            Ok(receipt) => {
                info!("Allocation confirmed: {:?}", receipt.tx_hash);
                Ok(receipt)
            }
            Err(e) => {
                warn!("Allocation to {:?} failed: {}", venue, e);
                Err(Error::AllocationFailed {
                    venue: format!("{:?}", venue),
                    cause: e.to_string(),
                })
            }
        }
    }

    /// Allocate the user's full deposit to the venue they opted into, if a
    /// decision exists for that venue's tier
    pub async fn rebalance_user(
        &self,
        user: Address,
        store: &StrategyStore,
    ) -> Result<RebalanceOutcome> {
        let venue = self.ledger.get_user_strategy(user).await?;
        let tier = self
            .venues
            .tier_for(venue)
            .ok_or_else(|| Error::UnknownVenue(format!("{:?} (chosen by {:?})", venue, user)))?;

        let Some(decision) = store.get(tier).await? else {
            info!("No {} risk decision stored yet; skipping {:?}", tier, user);
            return Ok(RebalanceOutcome::NoDecision { tier });
        };

        let amount = self.current_deposit(user).await?;
        if amount.is_zero() {
            info!("{:?} has no deposit to allocate", user);
            return Ok(RebalanceOutcome::NothingToAllocate { tier });
        }

        let receipt = self.allocate(user, amount, venue).await?;
        Ok(RebalanceOutcome::Allocated {
            tier,
            amount,
            receipt,
            decision,
        })
    }

    /// Opt the signing account into the venue for `tier`
    pub async fn set_user_strategy(&self, tier: RiskTier) -> Result<TxReceipt> {
        let venue = self.venues.venue_for(tier);
        info!("Setting strategy preference to {} risk venue {:?}", tier, venue);
        self.ledger.set_user_strategy(venue).await
    }
}
