//! CLI command implementations

use anyhow::Result;
use dialoguer::Confirm;
use ethers::types::{Address, U256};
use ethers::utils::{format_units, parse_units, ParseUnits};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::actions;
use crate::allocation::{AllocationExecutor, RebalanceOutcome, VenueBook};
use crate::config::{mask_url, parse_address, Config};
use crate::error::Error;
use crate::ledger::{EvmLedger, DEPOSIT_TOKEN_DECIMALS};
use crate::market::{PriceFeedClient, YieldFeedClient};
use crate::store::StrategyStore;
use crate::strategy::{CycleOutcome, RiskTier, StrategyEngine};

/// Slack on top of the confirmation timeout before the CLI gives up
const ALLOCATE_GRACE_SECS: u64 = 30;

fn open_store(config: &Config) -> Result<StrategyStore> {
    Ok(StrategyStore::from_config(
        &config.store,
        Duration::from_millis(config.feeds.timeout_ms),
    )?)
}

async fn open_executor(config: &Config) -> Result<AllocationExecutor> {
    let venues = VenueBook::from_config(&config.ledger)?;
    let ledger = EvmLedger::connect(&config.ledger).await?;
    Ok(AllocationExecutor::new(Arc::new(ledger), venues))
}

/// Human amount in deposit token units ("12.5") to base units
pub fn parse_amount(amount: &str) -> Result<U256> {
    match parse_units(amount.trim(), DEPOSIT_TOKEN_DECIMALS)
        .map_err(|e| anyhow::anyhow!("Invalid amount {:?}: {}", amount, e))?
    {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => anyhow::bail!("Invalid amount {:?}: must not be negative", amount),
    }
}

/// Resolve `--venue` / `--tier` to a configured venue and the tier it serves
pub fn resolve_venue(
    venues: &VenueBook,
    venue: Option<&str>,
    tier: Option<RiskTier>,
) -> Result<(Address, RiskTier)> {
    match (venue, tier) {
        (Some(v), _) => {
            let address = parse_address("--venue", v)?;
            let tier = venues
                .tier_for(address)
                .ok_or_else(|| Error::UnknownVenue(format!("{:?}", address)))?;
            Ok((address, tier))
        }
        (None, Some(t)) => Ok((venues.venue_for(t), t)),
        (None, None) => anyhow::bail!("Either --venue or --tier is required"),
    }
}

/// Base units to a human amount in deposit token units
pub fn display_amount(amount: U256) -> String {
    format_units(amount, DEPOSIT_TOKEN_DECIMALS).unwrap_or_else(|_| amount.to_string())
}

/// Start the periodic strategy agent
pub async fn start(config: &Config) -> Result<()> {
    let engine = StrategyEngine::from_config(config)?;
    info!("Strategy store: {}", engine.store().describe());

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping after the current cycle");
        }
        trigger.cancel();
    });

    engine
        .run_scheduled(
            Duration::from_secs(config.selection.cycle_interval_secs),
            &config.selection.tiers,
            shutdown,
        )
        .await;

    Ok(())
}

/// Run a single decision cycle for one tier, or every configured tier
pub async fn run_once(config: &Config, tier: Option<RiskTier>) -> Result<()> {
    let engine = StrategyEngine::from_config(config)?;
    let tiers = match tier {
        Some(t) => vec![t],
        None => config.selection.tiers.clone(),
    };

    let mut failed = 0;
    for (tier, result) in engine.run_all(&tiers).await {
        match result {
            Ok(CycleOutcome::Persisted(decision)) => {
                println!("{} tier: stored new decision", tier);
                println!("{}", serde_json::to_string_pretty(&decision)?);
            }
            Ok(CycleOutcome::NoEligiblePool { trend }) => {
                println!("{} tier: no eligible pool ({}), previous decision kept", tier, trend);
            }
            Err(e) => {
                println!("{} tier: FAILED: {}", tier, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} cycles failed", failed, tiers.len());
    }
    Ok(())
}

/// Print the stored strategy for a tier, as the hosting action would
pub async fn query(config: &Config, risk: &str) -> Result<()> {
    let store = open_store(config)?;
    let response = actions::respond(&store, &json!({ "risk": risk }), None).await;
    println!("{}", response.text);
    Ok(())
}

/// Allocate a user's deposit to a venue
pub async fn allocate(
    config: &Config,
    user: &str,
    venue: Option<&str>,
    tier: Option<RiskTier>,
    amount: Option<&str>,
    force: bool,
    dry_run: bool,
) -> Result<()> {
    let user = parse_address("--user", user)?;
    let venues = VenueBook::from_config(&config.ledger)?;
    let (venue, tier) = resolve_venue(&venues, venue, tier)?;

    let amount = match amount {
        Some(a) => Some(parse_amount(a)?),
        None => None,
    };

    if dry_run {
        if let Some(amount) = amount {
            info!(
                "DRY-RUN: Would allocate {} USDC to {:?} ({} risk) for {:?}",
                display_amount(amount),
                venue,
                tier,
                user
            );
            return Ok(());
        }
    }

    let executor = open_executor(config).await?;
    let amount = match amount {
        Some(a) => a,
        None => executor.current_deposit(user).await?,
    };

    println!("\n=== ALLOCATION ===\n");
    println!("User:   {:?}", user);
    println!("Venue:  {:?} ({} risk)", venue, tier);
    println!("Amount: {} USDC ({} base units)", display_amount(amount), amount);
    println!();

    if dry_run {
        info!("DRY-RUN: Would allocate {} to {:?}", amount, venue);
        return Ok(());
    }

    if !force {
        let confirmed = Confirm::new()
            .with_prompt("Submit this allocation? It cannot be undone.")
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Allocation cancelled by user");
            return Ok(());
        }
    }

    let limit = Duration::from_secs(config.ledger.confirmation_timeout_secs + ALLOCATE_GRACE_SECS);
    let receipt = tokio::time::timeout(limit, executor.allocate(user, amount, venue))
        .await
        .map_err(|_| anyhow::anyhow!("Allocation not confirmed within {}s", limit.as_secs()))??;

    println!("Allocation confirmed!");
    println!("Tx hash: {:?}", receipt.tx_hash);
    if let Some(block) = receipt.block_number {
        println!("Block:   {}", block);
    }
    Ok(())
}

/// Allocate a user's whole deposit per their chosen venue and its latest decision
pub async fn rebalance(config: &Config, user: &str) -> Result<()> {
    let user = parse_address("--user", user)?;
    let store = open_store(config)?;
    let executor = open_executor(config).await?;

    match executor.rebalance_user(user, &store).await? {
        RebalanceOutcome::Allocated {
            tier,
            amount,
            receipt,
            decision,
        } => {
            let pool = decision
                .selected_pool
                .map(|p| format!("{} ({})", p.pool_id, p.protocol))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "Allocated {} USDC to the {} risk venue (decision pool: {})",
                display_amount(amount),
                tier,
                pool
            );
            println!("Tx hash: {:?}", receipt.tx_hash);
        }
        RebalanceOutcome::NoDecision { tier } => {
            println!("No {} risk decision stored yet; nothing done", tier);
        }
        RebalanceOutcome::NothingToAllocate { tier } => {
            println!("User has no deposit to allocate ({} risk venue)", tier);
        }
    }
    Ok(())
}

/// Set the signer's venue preference
pub async fn set_strategy(config: &Config, tier: RiskTier, force: bool) -> Result<()> {
    let executor = open_executor(config).await?;
    let venue = executor.venues().venue_for(tier);

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Switch strategy preference to {} risk venue {:?}?", tier, venue))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Strategy change cancelled by user");
            return Ok(());
        }
    }

    let receipt = executor.set_user_strategy(tier).await?;
    println!("Strategy preference set to {} risk", tier);
    println!("Tx hash: {:?}", receipt.tx_hash);
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check system health
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;
    let timeout = Duration::from_millis(config.feeds.timeout_ms);

    print!("Yield feed ({})... ", mask_url(&config.feeds.yield_base_url));
    match check_yield_feed(config, timeout).await {
        Ok((count, latency)) => println!("OK ({} pools, {}ms)", count, latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Price feed ({})... ", mask_url(&config.feeds.price_base_url));
    match check_price_feed(config, timeout).await {
        Ok(count) => println!("OK ({} samples)", count),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Strategy store... ");
    match check_store(config).await {
        Ok(summary) => println!("OK ({})", summary),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Ledger RPC ({})... ", mask_url(&config.ledger.rpc_url));
    match check_ledger(config).await {
        Ok(summary) => println!("OK ({})", summary),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    println!();
    if all_healthy {
        println!("All systems healthy!");
    } else {
        println!("Some systems are unhealthy. Check the errors above.");
    }

    Ok(())
}

async fn check_yield_feed(config: &Config, timeout: Duration) -> Result<(usize, u128)> {
    let client = YieldFeedClient::new(
        &config.feeds.yield_base_url,
        timeout,
        config.feeds.require_active_status,
    );
    let start = Instant::now();
    let pools = client.fetch_pools().await?;
    Ok((pools.len(), start.elapsed().as_millis()))
}

async fn check_price_feed(config: &Config, timeout: Duration) -> Result<usize> {
    let client = PriceFeedClient::new(&config.feeds.price_base_url, timeout);
    let samples = client
        .fetch_price_history(&config.selection.reference_asset, config.selection.lookback_days)
        .await?;
    Ok(samples.len())
}

async fn check_store(config: &Config) -> Result<String> {
    let store = open_store(config)?;
    let mut present = Vec::new();
    for tier in RiskTier::ALL {
        if store.get(tier).await?.is_some() {
            present.push(tier.to_string());
        }
    }
    Ok(format!(
        "{}, decisions: [{}]",
        store.describe(),
        present.join(", ")
    ))
}

async fn check_ledger(config: &Config) -> Result<String> {
    let ledger = EvmLedger::connect(&config.ledger).await?;
    let block = ledger.block_number().await?;

    match ledger.registered_venues().await {
        Ok((low, high)) => {
            let venues = VenueBook::from_config(&config.ledger)?;
            if venues.low != low || venues.high != high {
                warn!(
                    "Configured venues differ from the strategy manager (low {:?}, high {:?})",
                    low, high
                );
            }
        }
        Err(e) => error!("Could not read registered venues: {}", e),
    }

    let tvl = ledger.total_value_locked().await?;
    Ok(format!(
        "block {}, signer {:?}, TVL {} USDC",
        block,
        ledger.signer_address(),
        display_amount(tvl)
    ))
}
