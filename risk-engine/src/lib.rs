//! Risk Engine
//!
//! Customer risk profiles derived from screening and verification outcomes,
//! and the synchronous gate consulted before every transaction.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod gate;
pub mod limits;
pub mod profile;
pub mod rules;
pub mod scoring;
pub mod types;
pub mod usage;

pub use error::{Error, Result};
pub use gate::TransactionEligibilityGate;
pub use limits::{LimitChecker, LimitConfig, LimitKind, TierPolicy, TierTable};
pub use profile::{InMemoryProfileRepository, ProfileRepository, RiskProfileEngine};
pub use rules::{GateRules, RiskRules, ScoringWeights};
pub use scoring::{derive_factors, ProfileInputs, RiskAssessment, RiskScorer};
pub use types::*;
pub use usage::{InMemoryUsageLedger, UsageAggregator};
