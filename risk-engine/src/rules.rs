//! Static rule tables injected at construction time

use crate::limits::TierTable;
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Score contribution of each input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Sanctions match
    pub sanctions: f64,
    /// PEP match
    pub pep: f64,
    /// Adverse media match
    pub adverse_media: f64,
    /// Geographic risk at or above the high-risk geography score
    pub high_risk_geography: f64,
    /// Per reported suspicious activity
    pub suspicious_activity: f64,
    /// Cap on the suspicious activity contribution
    pub suspicious_activity_cap: f64,
    /// No completed identity verification
    pub unverified_identity: f64,
    /// Per failed verification
    pub failed_verification: f64,
    /// Cap on the failed verification contribution
    pub failed_verification_cap: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            sanctions: 70.0,
            pep: 40.0,
            adverse_media: 25.0,
            high_risk_geography: 20.0,
            suspicious_activity: 10.0,
            suspicious_activity_cap: 30.0,
            unverified_identity: 15.0,
            failed_verification: 5.0,
            failed_verification_cap: 15.0,
        }
    }
}

/// Rules for deriving a risk profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskRules {
    /// Score at or above which a profile is High
    pub high_risk_threshold: f64,
    /// Score at or above which a profile is Medium
    pub medium_risk_threshold: f64,
    /// Screening matches below this score are ignored
    pub min_match_score: u8,
    /// Score weights
    pub weights: ScoringWeights,
    /// Country risk (ISO alpha-2, 0-100)
    pub country_risk: HashMap<String, u8>,
    /// Score of a country missing from `country_risk`
    pub default_country_risk: u8,
    /// Geographic score at or above which geography is a risk factor
    pub high_risk_geography_score: u8,
    /// Always restricted
    pub embargoed_countries: BTreeSet<String>,
    /// Restricted for High rated profiles
    pub high_risk_countries: BTreeSet<String>,
    /// Restricted for High rated or sanctioned profiles
    pub high_risk_currencies: BTreeSet<String>,
    /// Limits and CDD per rating
    pub tiers: TierTable,
}

impl Default for RiskRules {
    fn default() -> Self {
        let country_risk = [
            ("KP", 100),
            ("IR", 100),
            ("SY", 95),
            ("CU", 85),
            ("AF", 85),
            ("MM", 80),
            ("YE", 75),
            ("RU", 70),
            ("VE", 65),
            ("PK", 60),
            ("NG", 55),
            ("AE", 30),
            ("US", 10),
            ("GB", 10),
            ("DE", 5),
            ("CH", 5),
        ]
        .into_iter()
        .map(|(c, s)| (c.to_string(), s))
        .collect();

        Self {
            high_risk_threshold: 70.0,
            medium_risk_threshold: 40.0,
            min_match_score: 85,
            weights: ScoringWeights::default(),
            country_risk,
            default_country_risk: 20,
            high_risk_geography_score: 60,
            embargoed_countries: codes(&["KP", "IR", "SY", "CU"]),
            high_risk_countries: codes(&["AF", "MM", "YE", "RU", "VE"]),
            high_risk_currencies: codes(&["RUB", "IRR", "KPW", "SYP"]),
            tiers: TierTable::default(),
        }
    }
}

impl RiskRules {
    /// Risk of one country
    pub fn country_score(&self, country: &str) -> u8 {
        self.country_risk
            .get(&country.to_uppercase())
            .copied()
            .unwrap_or(self.default_country_risk)
            .min(100)
    }

    /// Whether a score falls in the High tier
    pub fn is_high_risk(&self, score: f64) -> bool {
        score >= self.high_risk_threshold
    }

    /// Check thresholds and tiers
    pub fn validate(&self) -> Result<()> {
        let in_range = |t: f64| (0.0..=100.0).contains(&t);
        if !in_range(self.high_risk_threshold) || !in_range(self.medium_risk_threshold) {
            return Err(Error::InvalidConfig(
                "risk thresholds must be within 0-100".to_string(),
            ));
        }
        if self.medium_risk_threshold > self.high_risk_threshold {
            return Err(Error::InvalidConfig(format!(
                "medium threshold {} is above high threshold {}",
                self.medium_risk_threshold, self.high_risk_threshold
            )));
        }
        if self.min_match_score > 100 {
            return Err(Error::InvalidConfig("min_match_score must be within 0-100".to_string()));
        }
        self.tiers.validate()
    }
}

/// Rules for the transaction-time gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateRules {
    /// Amounts strictly above this need additional verification
    pub additional_verification_amount: Decimal,
    /// Destinations that need additional verification
    pub high_risk_countries: BTreeSet<String>,
}

impl Default for GateRules {
    fn default() -> Self {
        Self {
            additional_verification_amount: Decimal::from(50_000),
            high_risk_countries: codes(&["KP", "IR", "SY", "CU", "AF", "MM", "YE"]),
        }
    }
}

impl GateRules {
    /// Check values
    pub fn validate(&self) -> Result<()> {
        if self.additional_verification_amount.is_sign_negative() {
            return Err(Error::InvalidConfig(
                "additional_verification_amount must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a destination is on the high-risk list
    pub fn is_high_risk_destination(&self, country: &str) -> bool {
        self.high_risk_countries.contains(&country.trim().to_uppercase())
    }
}

fn codes(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        assert!(RiskRules::default().validate().is_ok());
        assert!(GateRules::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds() {
        let rules = RiskRules {
            medium_risk_threshold: 80.0,
            ..RiskRules::default()
        };
        assert!(matches!(rules.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_country_lookup() {
        let rules = RiskRules::default();
        assert_eq!(rules.country_score("ir"), 100);
        assert_eq!(rules.country_score("FR"), rules.default_country_risk);
        assert!(GateRules::default().is_high_risk_destination(" kp "));
        assert!(!GateRules::default().is_high_risk_destination("DE"));
    }
}
