//! On-demand fund allocation against the latest stored decision

pub mod executor;

pub use executor::{AllocationExecutor, RebalanceOutcome, VenueBook};
