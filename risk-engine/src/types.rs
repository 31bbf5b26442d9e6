//! Core types for risk engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Risk score (0-100)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(f64);

impl RiskScore {
    /// Create new risk score, clamped to 0-100 (NaN becomes 0)
    pub fn new(score: f64) -> Self {
        if score.is_nan() {
            return Self(0.0);
        }
        Self(score.clamp(0.0, 100.0))
    }

    /// Get raw score
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Risk rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRating {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
    /// Not enough information yet
    Unknown,
}

/// Customer due diligence level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CddLevel {
    /// Standard CDD
    Standard,
    /// Enhanced CDD
    Enhanced,
}

/// Risk factors surfaced on a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    /// Screening matched a PEP list
    PoliticallyExposedPerson,
    /// Screening matched a sanctions list
    SanctionsMatch,
    /// Screening matched adverse media
    AdverseMedia,
    /// Geographic risk at or above the high-risk geography score
    HighRiskGeography,
    /// Suspicious activity was reported
    SuspiciousActivityHistory,
}

impl RiskFactor {
    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFactor::PoliticallyExposedPerson => "politically_exposed_person",
            RiskFactor::SanctionsMatch => "sanctions_match",
            RiskFactor::AdverseMedia => "adverse_media",
            RiskFactor::HighRiskGeography => "high_risk_geography",
            RiskFactor::SuspiciousActivityHistory => "suspicious_activity_history",
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic component of a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographicRisk {
    /// Highest country score among known countries (0-100)
    pub score: u8,
    /// Countries that contributed, e.g. `residence:DE`
    pub factors: Vec<String>,
}

/// Transaction limits for a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileLimits {
    /// Per calendar day
    pub daily: Decimal,
    /// Per calendar month
    pub monthly: Decimal,
    /// Per transaction
    pub single: Decimal,
}

impl ProfileLimits {
    /// All limits zero
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Per-customer risk profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRiskProfile {
    /// Owner
    pub user_id: String,
    /// Human-readable profile reference
    pub profile_number: String,
    /// Rating
    pub risk_rating: RiskRating,
    /// Score (0-100)
    pub risk_score: RiskScore,
    /// Due diligence level
    pub cdd_level: CddLevel,
    /// Politically exposed
    pub is_pep: bool,
    /// Sanctions match
    pub is_sanctioned: bool,
    /// Adverse media match
    pub has_adverse_media: bool,
    /// Geographic risk
    pub geographic_risk: GeographicRisk,
    /// Reported suspicious activities
    pub suspicious_activities_count: u32,
    /// Derived risk factors, sorted
    pub risk_factors: Vec<RiskFactor>,
    /// Transaction limits
    pub limits: ProfileLimits,
    /// Countries the customer may not transact with
    pub restricted_countries: BTreeSet<String>,
    /// Currencies the customer may not transact in
    pub restricted_currencies: BTreeSet<String>,
    /// Under enhanced monitoring
    pub enhanced_monitoring: bool,
    /// Last recompute from screening or verification data
    pub last_reviewed_at: Option<DateTime<Utc>>,
    /// Next periodic review
    pub next_review_at: Option<DateTime<Utc>>,
    /// Created
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// Incremented on every save
    pub version: u64,
}

impl CustomerRiskProfile {
    /// Fresh profile: unknown rating, zero limits, no restrictions
    pub fn new(user_id: &str, profile_number: String, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            profile_number,
            risk_rating: RiskRating::Unknown,
            risk_score: RiskScore::default(),
            cdd_level: CddLevel::Standard,
            is_pep: false,
            is_sanctioned: false,
            has_adverse_media: false,
            geographic_risk: GeographicRisk::default(),
            suspicious_activities_count: 0,
            risk_factors: Vec::new(),
            limits: ProfileLimits::zero(),
            restricted_countries: BTreeSet::new(),
            restricted_currencies: BTreeSet::new(),
            enhanced_monitoring: false,
            last_reviewed_at: None,
            next_review_at: None,
            created_at: at,
            updated_at: at,
            version: 0,
        }
    }

    /// Whether a factor is present
    pub fn has_factor(&self, factor: RiskFactor) -> bool {
        self.risk_factors.contains(&factor)
    }
}

/// Usage window for limit checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsagePeriod {
    /// Calendar day (UTC)
    Day,
    /// Calendar month (UTC)
    Month,
}

/// A transaction about to be executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTransaction {
    /// Amount in `currency`
    pub amount: Decimal,
    /// ISO currency code
    pub currency: String,
    /// ISO country code of the beneficiary
    pub destination_country: Option<String>,
}

impl ProposedTransaction {
    /// Transaction without a known destination
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
            destination_country: None,
        }
    }

    /// Set the destination country
    pub fn to_country(mut self, country: &str) -> Self {
        self.destination_country = Some(country.to_string());
        self
    }
}

/// Outcome of an eligibility check; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEligibilityDecision {
    /// Transaction may proceed
    pub allowed: bool,
    /// Explanation
    pub reason: Option<String>,
    /// Limit the decision was made against
    pub limit: Option<Decimal>,
    /// Usage in the limit's period
    pub current_usage: Option<Decimal>,
    /// Caller should collect more verification before retrying
    pub requires_additional_verification: bool,
}

impl TransactionEligibilityDecision {
    /// Allowed decision
    pub fn allow(reason: impl Into<String>, limit: Decimal, current_usage: Decimal) -> Self {
        Self {
            allowed: true,
            reason: Some(reason.into()),
            limit: Some(limit),
            current_usage: Some(current_usage),
            requires_additional_verification: false,
        }
    }

    /// Denied decision
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            limit: None,
            current_usage: None,
            requires_additional_verification: false,
        }
    }

    /// Attach the limit and usage that caused a denial
    pub fn against(mut self, limit: Decimal, current_usage: Decimal) -> Self {
        self.limit = Some(limit);
        self.current_usage = Some(current_usage);
        self
    }

    /// Flag that more verification is needed
    pub fn needing_verification(mut self, required: bool) -> Self {
        self.requires_additional_verification = required;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_score_clamped() {
        assert_eq!(RiskScore::new(140.0).value(), 100.0);
        assert_eq!(RiskScore::new(-3.0).value(), 0.0);
        assert_eq!(RiskScore::new(f64::NAN).value(), 0.0);
    }

    #[test]
    fn test_new_profile_is_unknown() {
        let profile = CustomerRiskProfile::new("u1", "CRP-1".to_string(), Utc::now());
        assert_eq!(profile.risk_rating, RiskRating::Unknown);
        assert_eq!(profile.limits, ProfileLimits::zero());
        assert!(profile.risk_factors.is_empty());
    }
}
