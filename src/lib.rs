//! Yieldbot Library
//!
//! Risk-tiered DeFi yield strategy selection with on-chain vault allocation.

pub mod actions;
pub mod allocation;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod market;
pub mod store;
pub mod strategy;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
