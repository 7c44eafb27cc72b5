//! Error types for the yield agent

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the yield agent
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid address for {field}: {value}")]
    InvalidAddress { field: String, value: String },

    // Market data errors
    #[error("{feed} feed unavailable: {reason}")]
    UpstreamUnavailable { feed: String, reason: String },

    #[error("Not enough price history for trend detection: need {required} samples, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    // Allocation errors
    #[error("Unknown venue: {0}")]
    UnknownVenue(String),

    #[error("Invalid allocation amount: {0}")]
    InvalidAmount(String),

    #[error("Allocation to {venue} failed: {cause}")]
    AllocationFailed { venue: String, cause: String },

    // Ledger errors
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Ledger call timed out after {0}s")]
    LedgerTimeout(u64),

    // Persistence errors
    #[error("Strategy store error: {0}")]
    Store(String),

    // Action surface errors
    #[error("Invalid request field '{field}': {message}")]
    InvalidRequest { field: String, message: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Shorthand for a feed failure
    pub fn upstream(feed: &str, reason: impl ToString) -> Self {
        Error::UpstreamUnavailable {
            feed: feed.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable { .. } | Error::Ledger(_) | Error::LedgerTimeout(_)
        )
    }

    /// Check if this error aborts a decision cycle before anything is written
    pub fn aborts_cycle(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable { .. } | Error::InsufficientHistory { .. }
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
