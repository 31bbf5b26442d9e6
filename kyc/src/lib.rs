//! KYC verification lifecycle.
//!
//! A [`KycVerification`] moves `Pending -> InProgress -> Completed`, or ends
//! in `Failed` or `Expired`. All changes go through
//! [`KycVerificationStateMachine`], which serializes operations per
//! verification and commits each one with a single versioned save.

pub mod config;
pub mod error;
pub mod machine;
pub mod repository;
pub mod storage;
pub mod types;
pub mod verifier;

pub use config::KycConfig;
pub use error::{Error, Result};
pub use machine::{
    next_steps, BiometricSubmission, DocumentSubmission, KycVerificationStateMachine, Verifiers,
    AUTO_COMPLETE_CONFIDENCE,
};
pub use repository::{InMemoryVerificationRepository, VerificationRepository};
pub use storage::{DocumentStore, InMemoryDocumentStore};
pub use types::{
    BiometricCheck, DocumentCheck, KycVerification, Transition, VerificationStatus,
    VerificationType,
};
pub use verifier::{BasicDocumentVerifier, BiometricVerifier, DocumentVerifier};
