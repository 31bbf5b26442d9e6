//! Sanctions, PEP and adverse-media screening across heterogeneous providers.
//!
//! Each provider sits behind a [`ProviderAdapter`] that turns outages into
//! empty-but-checked results, and [`ScreeningAggregator`] merges every
//! provider's contribution into one [`ScreeningResult`].

pub mod aggregator;
pub mod config;
pub mod error;
pub mod heuristic;
pub mod metrics;
pub mod provider;
pub mod remote;
pub mod repository;
pub mod types;

pub use aggregator::ScreeningAggregator;
pub use config::{ProviderConfig, ProviderKind, ScreeningConfig, WatchlistSource};
pub use error::{Error, Result};
pub use heuristic::{HeuristicProvider, WatchlistEntry};
pub use provider::{AuditSink, ProviderAdapter, ProviderFailure, ScreeningProvider, TracingAuditSink};
pub use remote::{RemoteListProvider, RemoteListSettings, ScoreScale};
pub use repository::{InMemoryScreeningRepository, ScreeningRepository};
pub use types::{
    MatchCategory, ScreeningMatch, ScreeningRecord, ScreeningResult, ScreeningSubject, SubjectKind,
};

/// Default per-call provider timeout (milliseconds)
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;
