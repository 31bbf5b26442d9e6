//! Compliance Decisioning Engine
//!
//! Facade over sanctions/PEP screening, KYC verification, customer risk
//! profiles and the transaction eligibility gate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;

pub use config::{Config, LogConfig};
pub use engine::{
    Collaborators, ComplianceEngine, KycStatus, ScreeningOutcome, VerificationSummary,
};
pub use error::{ComplianceError, ErrorKind, Result};
pub use telemetry::init_tracing;

pub use kyc;
pub use risk_engine;
pub use screening;
