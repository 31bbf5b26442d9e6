//! Configuration for the compliance engine

use crate::error::{ComplianceError, Result};
use kyc::KycConfig;
use risk_engine::{GateRules, RiskRules};
use screening::ScreeningConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Compliance engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Logging
    pub log: LogConfig,

    /// Screening providers
    pub screening: ScreeningConfig,

    /// Verification lifecycle
    pub kyc: KycConfig,

    /// Risk scoring and tiers
    pub risk: RiskRules,

    /// Transaction-time rules
    pub gate: GateRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "compliance-engine".to_string(),
            log: LogConfig::default(),
            screening: ScreeningConfig::default(),
            kyc: KycConfig::default(),
            risk: RiskRules::default(),
            gate: GateRules::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "compliance_engine=info,screening=info,kyc=info,risk_engine=info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ComplianceError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ComplianceError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(filter) = std::env::var("COMPLIANCE_LOG_FILTER") {
            config.log.filter = filter;
        }

        if let Ok(json) = std::env::var("COMPLIANCE_LOG_JSON") {
            config.log.json = parse_env("COMPLIANCE_LOG_JSON", &json)?;
        }

        if let Ok(timeout) = std::env::var("COMPLIANCE_PROVIDER_TIMEOUT_MS") {
            config.screening.default_timeout_ms = parse_env("COMPLIANCE_PROVIDER_TIMEOUT_MS", &timeout)?;
        }

        if let Ok(days) = std::env::var("COMPLIANCE_VERIFICATION_TTL_DAYS") {
            config.kyc.verification_ttl_days = parse_env("COMPLIANCE_VERIFICATION_TTL_DAYS", &days)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.screening.validate()?;
        self.risk.validate()?;
        self.gate.validate()?;
        if self.kyc.verification_ttl_days <= 0 {
            return Err(ComplianceError::Config(
                "kyc.verification_ttl_days must be positive".to_string(),
            ));
        }
        if self.kyc.identity_document_types.is_empty() || self.kyc.address_document_types.is_empty() {
            return Err(ComplianceError::Config(
                "kyc document type lists must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ComplianceError::Config(format!("Invalid {}={}: {}", name, value, e)))
}
