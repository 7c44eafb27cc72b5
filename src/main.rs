//! Yieldbot - risk-tiered DeFi yield strategy agent
//!
//! # WARNING
//! - `allocate`, `rebalance` and `set-strategy` submit real transactions.
//! - Yields and risk tiers come from public feeds and a static table; they are
//!   not investment advice.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

// Use the library crate
use yieldbot::cli::commands;
use yieldbot::config::Config;
use yieldbot::strategy::RiskTier;

/// Yieldbot - DeFi yield strategy selection and allocation
#[derive(Parser)]
#[command(name = "yieldbot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run decision cycles on a fixed interval until Ctrl-C
    Start,

    /// Run a single decision cycle
    Run {
        /// Tier to run (default: every configured tier)
        #[arg(long)]
        tier: Option<RiskTier>,
    },

    /// Show the stored strategy for a risk tier
    Query {
        /// Risk tier: low or high
        #[arg(long)]
        tier: String,
    },

    /// Allocate a user's deposit to a strategy venue
    Allocate {
        /// User address
        #[arg(long)]
        user: String,

        /// Venue address
        #[arg(long, conflicts_with = "tier", required_unless_present = "tier")]
        venue: Option<String>,

        /// Use the configured venue for this tier
        #[arg(long)]
        tier: Option<RiskTier>,

        /// Amount in USDC (default: the user's full deposit)
        #[arg(long)]
        amount: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,

        /// Simulate only, don't execute
        #[arg(long)]
        dry_run: bool,
    },

    /// Allocate a user's deposit per their chosen venue and its latest decision
    Rebalance {
        /// User address
        #[arg(long)]
        user: String,
    },

    /// Set the signer's strategy preference
    SetStrategy {
        /// Risk tier: low or high
        #[arg(long)]
        tier: RiskTier,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check feeds, store and ledger connectivity
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("yieldbot=info".parse()?);
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    for warning in config.warnings() {
        warn!("{}", warning);
    }

    // Execute command
    let result = match cli.command {
        Commands::Start => commands::start(&config).await,
        Commands::Run { tier } => commands::run_once(&config, tier).await,
        Commands::Query { tier } => commands::query(&config, &tier).await,
        Commands::Allocate {
            user,
            venue,
            tier,
            amount,
            force,
            dry_run,
        } => {
            commands::allocate(
                &config,
                &user,
                venue.as_deref(),
                tier,
                amount.as_deref(),
                force,
                dry_run,
            )
            .await
        }
        Commands::Rebalance { user } => commands::rebalance(&config, &user).await,
        Commands::SetStrategy { tier, force } => commands::set_strategy(&config, tier, force).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
