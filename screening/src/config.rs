//! Provider configuration and registry

use crate::error::{Error, Result};
use crate::heuristic::HeuristicProvider;
use crate::provider::{AuditSink, ProviderAdapter, ScreeningProvider};
use crate::remote::{RemoteListProvider, RemoteListSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Screening configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningConfig {
    /// Providers, in the order their results are merged
    pub providers: Vec<ProviderConfig>,

    /// Per-call timeout used when a provider sets none
    pub default_timeout_ms: u64,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderConfig {
                name: "internal-watchlist".to_string(),
                kind: ProviderKind::Heuristic {
                    watchlists: Vec::new(),
                    min_score: 85.0,
                },
                timeout_ms: None,
            }],
            default_timeout_ms: crate::DEFAULT_PROVIDER_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub timeout_ms: Option<u64>,
}

/// The closed set of provider variants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderKind {
    RemoteList(RemoteListSettings),
    Heuristic {
        /// `(list name, csv path)` pairs loaded at start-up
        #[serde(default)]
        watchlists: Vec<WatchlistSource>,
        min_score: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistSource {
    pub list: String,
    pub path: PathBuf,
}

impl ScreeningConfig {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(Error::Config("Provider name must not be empty".to_string()));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate provider name: {}",
                    provider.name
                )));
            }
            if provider.timeout_ms == Some(0) {
                return Err(Error::Config(format!(
                    "Provider {} has a zero timeout",
                    provider.name
                )));
            }
            match &provider.kind {
                ProviderKind::Heuristic { min_score, .. } if !(0.0..=100.0).contains(min_score) => {
                    return Err(Error::Config(format!(
                        "Provider {} min_score must be within 0-100",
                        provider.name
                    )));
                }
                ProviderKind::RemoteList(settings) if settings.registration_budget_ms == Some(0) => {
                    return Err(Error::Config(format!(
                        "Provider {} has a zero registration budget",
                        provider.name
                    )));
                }
                _ => {}
            }
        }
        if self.default_timeout_ms == 0 {
            return Err(Error::Config("default_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Build one adapter per configured provider, preserving order.
    pub fn build_adapters(&self, audit: Arc<dyn AuditSink>) -> Result<Vec<ProviderAdapter>> {
        self.validate()?;
        self.providers
            .iter()
            .map(|config| {
                let timeout =
                    Duration::from_millis(config.timeout_ms.unwrap_or(self.default_timeout_ms));
                let provider = build_provider(config, timeout)?;
                Ok(ProviderAdapter::new(provider, timeout, audit.clone()))
            })
            .collect()
    }
}

fn build_provider(config: &ProviderConfig, timeout: Duration) -> Result<Arc<dyn ScreeningProvider>> {
    match &config.kind {
        ProviderKind::RemoteList(settings) => Ok(Arc::new(RemoteListProvider::new(
            &config.name,
            settings.clone(),
            timeout,
        )?)),
        ProviderKind::Heuristic {
            watchlists,
            min_score,
        } => {
            let provider = HeuristicProvider::new(&config.name, *min_score);
            for source in watchlists {
                provider.load_csv_file(&source.list, &source.path)?;
            }
            Ok(Arc::new(provider))
        }
    }
}
