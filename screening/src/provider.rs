//! Provider interface and the adapter boundary around it.
//!
//! A [`ScreeningProvider`] only knows how to talk to its source and may fail.
//! [`ProviderAdapter`] wraps one provider and applies the rules every source
//! shares:
//!
//! - no call is made when the subject lacks its required attribute; the
//!   result is empty and the provider is *not* marked as checked
//! - every attempted call carries a timeout
//! - transport errors, non-2xx responses and timeouts become an
//!   empty-but-checked result and are reported to the [`AuditSink`]

use crate::metrics;
use crate::types::{ScreeningMatch, ScreeningResult, ScreeningSubject, SubjectKind};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One sanctions/PEP/adverse-media source.
#[async_trait]
pub trait ScreeningProvider: Send + Sync {
    /// Provider name, used as the key in merged results
    fn name(&self) -> &str;

    /// Whether this source screens the given subject kind at all
    fn supports(&self, kind: SubjectKind) -> bool {
        let _ = kind;
        true
    }

    /// Name search. `name` is already trimmed and non-empty.
    async fn search_individual(
        &self,
        name: &str,
        subject: &ScreeningSubject,
    ) -> Result<Vec<ScreeningMatch>>;

    /// Address list membership. Both arguments are non-empty.
    async fn search_address(&self, address: &str, chain: &str) -> Result<Vec<ScreeningMatch>>;
}

/// A provider call that failed and was absorbed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub operation: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Receives absorbed provider failures for audit and alerting.
pub trait AuditSink: Send + Sync {
    fn record_provider_failure(&self, failure: &ProviderFailure);
}

/// Writes failures to the `screening::audit` tracing target.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record_provider_failure(&self, failure: &ProviderFailure) {
        warn!(
            target: "screening::audit",
            provider = %failure.provider,
            operation = %failure.operation,
            reason = %failure.reason,
            "Screening provider unavailable, contributing zero matches"
        );
    }
}

/// Fail-open boundary around a single provider.
#[derive(Clone)]
pub struct ProviderAdapter {
    provider: Arc<dyn ScreeningProvider>,
    timeout: Duration,
    audit: Arc<dyn AuditSink>,
}

impl ProviderAdapter {
    pub fn new(
        provider: Arc<dyn ScreeningProvider>,
        timeout: Duration,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            provider,
            timeout,
            audit,
        }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub async fn screen_individual(&self, subject: &ScreeningSubject) -> ScreeningResult {
        let name = match subject.name() {
            Some(name) if subject.kind == SubjectKind::Individual => name,
            _ => {
                debug!(provider = %self.name(), "Individual screen skipped: no name");
                return ScreeningResult::empty();
            }
        };
        if !self.provider.supports(SubjectKind::Individual) {
            return ScreeningResult::empty();
        }

        let outcome = self
            .call("screen_individual", self.provider.search_individual(name, subject))
            .await;
        self.absorb("screen_individual", outcome)
    }

    pub async fn screen_address(&self, address: &str, chain: &str) -> ScreeningResult {
        let (address, chain) = (address.trim(), chain.trim());
        if address.is_empty() || chain.is_empty() {
            debug!(provider = %self.name(), "Address screen skipped: no address or chain");
            return ScreeningResult::empty();
        }
        if !self.provider.supports(SubjectKind::Address) {
            return ScreeningResult::empty();
        }

        let outcome = self
            .call("screen_address", self.provider.search_address(address, chain))
            .await;
        self.absorb("screen_address", outcome)
    }

    pub async fn screen(&self, subject: &ScreeningSubject) -> ScreeningResult {
        match subject.kind {
            SubjectKind::Individual => self.screen_individual(subject).await,
            SubjectKind::Address => {
                self.screen_address(
                    subject.address_value().unwrap_or_default(),
                    subject.chain().unwrap_or_default(),
                )
                .await
            }
        }
    }

    async fn call<F>(&self, operation: &str, fut: F) -> std::result::Result<Vec<ScreeningMatch>, String>
    where
        F: std::future::Future<Output = Result<Vec<ScreeningMatch>>>,
    {
        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(matches)) => Ok(matches),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}ms", self.timeout.as_millis())),
        };

        let status = if outcome.is_ok() { "success" } else { "failure" };
        metrics::record_call(
            self.name(),
            operation,
            status,
            start.elapsed().as_secs_f64(),
        );
        outcome
    }

    fn absorb(
        &self,
        operation: &str,
        outcome: std::result::Result<Vec<ScreeningMatch>, String>,
    ) -> ScreeningResult {
        match outcome {
            Ok(matches) => {
                debug!(provider = %self.name(), matches = matches.len(), "{} complete", operation);
                ScreeningResult::from_matches(self.name(), matches)
            }
            Err(reason) => {
                self.audit.record_provider_failure(&ProviderFailure {
                    provider: self.name().to_string(),
                    operation: operation.to_string(),
                    reason,
                    occurred_at: Utc::now(),
                });
                ScreeningResult::checked(self.name())
            }
        }
    }
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("provider", &self.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
