//! Error types for risk engine

use thiserror::Error;

/// Risk engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input (non-positive amount, empty user)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Profile was saved by another writer first
    #[error("Risk profile for {user_id} was modified concurrently (expected version {expected})")]
    ConcurrentModification {
        /// Profile owner
        user_id: String,
        /// Version the writer started from
        expected: u64,
    },

    /// Repository failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading screening history failed
    #[error("Screening history unavailable: {0}")]
    Screening(#[from] screening::Error),

    /// Reading verification history failed
    #[error("Verification history unavailable: {0}")]
    Kyc(#[from] kyc::Error),
}

impl Error {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Persistence(_) | Error::ConcurrentModification { .. } => true,
            Error::Kyc(e) => e.is_retryable(),
            Error::Screening(screening::Error::Persistence(_)) => true,
            _ => false,
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
