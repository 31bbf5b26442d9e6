//! Error types for KYC verification

use crate::types::VerificationStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for KYC operations
pub type Result<T> = std::result::Result<T, Error>;

/// KYC errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// No verifier exists for this verification type
    #[error("Unsupported verification type for {operation}: {verification_type}")]
    UnsupportedVerificationType {
        /// Type name
        verification_type: String,
        /// Operation attempted
        operation: String,
    },

    /// Operation not allowed in the current status
    #[error("Verification {verification_id} is {status:?}; cannot {operation}")]
    StateConflict {
        /// Verification ID
        verification_id: Uuid,
        /// Current status
        status: VerificationStatus,
        /// Operation attempted
        operation: String,
    },

    /// Verification not found
    #[error("Verification not found: {0}")]
    NotFound(Uuid),

    /// Another writer saved first
    #[error("Verification {verification_id} was modified concurrently (expected version {expected})")]
    ConcurrentModification {
        /// Verification ID
        verification_id: Uuid,
        /// Version the writer started from
        expected: u64,
    },

    /// Verification has not reached its expiry time
    #[error("Verification {0} has not expired yet")]
    NotExpired(Uuid),

    /// Document storage failure
    #[error("Document storage error: {0}")]
    Storage(String),

    /// Verifier call failed (transport, vendor outage)
    #[error("Verifier error: {0}")]
    Verifier(String),

    /// Repository failure
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl Error {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Storage(_)
                | Error::Verifier(_)
                | Error::Persistence(_)
                | Error::ConcurrentModification { .. }
        )
    }
}
