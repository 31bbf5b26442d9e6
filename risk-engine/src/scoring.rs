//! Risk scoring engine

use crate::rules::RiskRules;
use crate::types::{GeographicRisk, RiskFactor, RiskRating, RiskScore};
use kyc::{KycVerification, VerificationStatus, VerificationType};
use screening::types::{ATTR_COUNTRY, ATTR_NATIONALITY};
use screening::{MatchCategory, ScreeningRecord, SubjectKind};
use std::collections::BTreeSet;

/// Everything known about a customer at recompute time
#[derive(Debug, Clone, Default)]
pub struct ProfileInputs<'a> {
    /// Screenings, newest first
    pub screenings: &'a [ScreeningRecord],
    /// Verification history
    pub verifications: &'a [KycVerification],
    /// Reported suspicious activities
    pub suspicious_activities: u32,
}

/// Scoring outcome
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// Politically exposed
    pub is_pep: bool,
    /// Sanctions match
    pub is_sanctioned: bool,
    /// Adverse media match
    pub has_adverse_media: bool,
    /// Geographic risk
    pub geographic_risk: GeographicRisk,
    /// Derived factors, sorted
    pub risk_factors: Vec<RiskFactor>,
    /// Score
    pub risk_score: RiskScore,
    /// Rating
    pub risk_rating: RiskRating,
}

/// Screening flags relevant to risk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ScreeningFlags {
    pep: bool,
    sanctioned: bool,
    adverse_media: bool,
}

/// Risk scorer
pub struct RiskScorer<'r> {
    rules: &'r RiskRules,
}

impl<'r> RiskScorer<'r> {
    /// Create new risk scorer
    pub fn new(rules: &'r RiskRules) -> Self {
        Self { rules }
    }

    /// Assess a customer
    pub fn assess(&self, inputs: &ProfileInputs<'_>) -> RiskAssessment {
        let flags = self.screening_flags(inputs.screenings);
        let geographic_risk = self.geographic_risk(inputs);
        let high_risk_geography = geographic_risk.score >= self.rules.high_risk_geography_score;

        let risk_factors = derive_factors(
            flags.pep,
            flags.sanctioned,
            flags.adverse_media,
            high_risk_geography,
            inputs.suspicious_activities,
        );

        let w = &self.rules.weights;
        let mut score = 0.0;
        if flags.sanctioned {
            score += w.sanctions;
        }
        if flags.pep {
            score += w.pep;
        }
        if flags.adverse_media {
            score += w.adverse_media;
        }
        if high_risk_geography {
            score += w.high_risk_geography;
        }
        score += (w.suspicious_activity * inputs.suspicious_activities as f64)
            .min(w.suspicious_activity_cap);

        let identity_verified = has_completed(inputs.verifications, VerificationType::Identity);
        if !identity_verified {
            score += w.unverified_identity;
        }
        let failed = inputs
            .verifications
            .iter()
            .filter(|v| v.status == VerificationStatus::Failed)
            .count();
        score += (w.failed_verification * failed as f64).min(w.failed_verification_cap);

        let risk_score = RiskScore::new(score);
        let any_completed = inputs
            .verifications
            .iter()
            .any(|v| v.status == VerificationStatus::Completed);
        let risk_rating = if inputs.screenings.is_empty() && !any_completed {
            RiskRating::Unknown
        } else {
            self.rating(risk_score)
        };

        RiskAssessment {
            is_pep: flags.pep,
            is_sanctioned: flags.sanctioned,
            has_adverse_media: flags.adverse_media,
            geographic_risk,
            risk_factors,
            risk_score,
            risk_rating,
        }
    }

    /// Rating for a score
    pub fn rating(&self, score: RiskScore) -> RiskRating {
        if self.rules.is_high_risk(score.value()) {
            RiskRating::High
        } else if score.value() >= self.rules.medium_risk_threshold {
            RiskRating::Medium
        } else {
            RiskRating::Low
        }
    }

    // latest screening per subject kind
    fn screening_flags(&self, screenings: &[ScreeningRecord]) -> ScreeningFlags {
        let min = self.rules.min_match_score;
        let mut flags = ScreeningFlags::default();
        for kind in [SubjectKind::Individual, SubjectKind::Address] {
            let latest = screenings
                .iter()
                .filter(|r| r.subject.kind == kind)
                .max_by_key(|r| r.screened_at);
            if let Some(record) = latest {
                let result = &record.result;
                flags.sanctioned |= result.matches_in(MatchCategory::Sanctions, min).next().is_some();
                flags.pep |= result.matches_in(MatchCategory::Pep, min).next().is_some();
                flags.adverse_media |= result
                    .matches_in(MatchCategory::AdverseMedia, min)
                    .next()
                    .is_some();
            }
        }
        flags
    }

    fn geographic_risk(&self, inputs: &ProfileInputs<'_>) -> GeographicRisk {
        let mut countries = BTreeSet::new();
        for v in inputs.verifications {
            if v.status != VerificationStatus::Completed {
                continue;
            }
            if let Some(country) = v.address_fields.as_ref().and_then(|f| f.get(ATTR_COUNTRY)) {
                countries.insert(("residence", country.trim().to_uppercase()));
            }
        }
        for record in inputs.screenings {
            if let Some(country) = record.subject.attribute(ATTR_COUNTRY) {
                countries.insert(("residence", country.to_uppercase()));
            }
            if let Some(country) = record.subject.attribute(ATTR_NATIONALITY) {
                countries.insert(("nationality", country.to_uppercase()));
            }
        }

        let mut risk = GeographicRisk::default();
        for (source, country) in countries {
            if country.is_empty() {
                continue;
            }
            risk.score = risk.score.max(self.rules.country_score(&country));
            risk.factors.push(format!("{}:{}", source, country));
        }
        risk
    }
}

/// Risk factors from profile flags. Order of the inputs does not matter and
/// factors may co-occur; the output is sorted.
pub fn derive_factors(
    is_pep: bool,
    is_sanctioned: bool,
    has_adverse_media: bool,
    high_risk_geography: bool,
    suspicious_activities: u32,
) -> Vec<RiskFactor> {
    let mut factors = Vec::new();
    if is_pep {
        factors.push(RiskFactor::PoliticallyExposedPerson);
    }
    if is_sanctioned {
        factors.push(RiskFactor::SanctionsMatch);
    }
    if has_adverse_media {
        factors.push(RiskFactor::AdverseMedia);
    }
    if high_risk_geography {
        factors.push(RiskFactor::HighRiskGeography);
    }
    if suspicious_activities > 0 {
        factors.push(RiskFactor::SuspiciousActivityHistory);
    }
    factors.sort();
    factors
}

pub(crate) fn has_completed(verifications: &[KycVerification], verification_type: VerificationType) -> bool {
    verifications
        .iter()
        .any(|v| v.verification_type == verification_type && v.status == VerificationStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use screening::{ScreeningMatch, ScreeningResult, ScreeningSubject};
    use std::collections::HashMap;

    fn screened(program: &str, score: f64) -> ScreeningRecord {
        let hit = ScreeningMatch::new(
            "alpha",
            "E-1",
            "John Doe",
            score,
            SubjectKind::Individual,
            program,
            "",
        )
        .into_iter()
        .collect();
        ScreeningRecord::new(
            "u1",
            ScreeningSubject::individual("John Doe"),
            ScreeningResult::from_matches("alpha", hit),
        )
    }

    fn completed(verification_type: VerificationType) -> KycVerification {
        let mut v = KycVerification::new("u1", verification_type, "internal", Duration::days(30));
        v.status = VerificationStatus::Completed;
        v
    }

    #[test]
    fn test_no_data_stays_unknown() {
        let rules = RiskRules::default();
        let assessment = RiskScorer::new(&rules).assess(&ProfileInputs::default());

        assert_eq!(assessment.risk_rating, RiskRating::Unknown);
        assert!(assessment.risk_factors.is_empty());
    }

    #[test]
    fn test_sanctions_match_is_high() {
        let rules = RiskRules::default();
        let screenings = vec![screened("SDN", 96.0)];
        let verifications = vec![completed(VerificationType::Identity)];
        let assessment = RiskScorer::new(&rules).assess(&ProfileInputs {
            screenings: &screenings,
            verifications: &verifications,
            suspicious_activities: 0,
        });

        assert!(assessment.is_sanctioned);
        assert_eq!(assessment.risk_factors, vec![RiskFactor::SanctionsMatch]);
        assert_eq!(assessment.risk_score.value(), 70.0);
        assert_eq!(assessment.risk_rating, RiskRating::High);
    }

    #[test]
    fn test_weak_matches_ignored() {
        let rules = RiskRules::default();
        let screenings = vec![screened("PEP", 60.0)];
        let verifications = vec![completed(VerificationType::Identity)];
        let assessment = RiskScorer::new(&rules).assess(&ProfileInputs {
            screenings: &screenings,
            verifications: &verifications,
            suspicious_activities: 0,
        });

        assert!(!assessment.is_pep);
        assert_eq!(assessment.risk_rating, RiskRating::Low);
    }

    #[test]
    fn test_latest_screening_supersedes() {
        let rules = RiskRules::default();
        let mut old = screened("SDN", 99.0);
        old.screened_at = old.screened_at - Duration::days(10);
        let clear = ScreeningRecord::new(
            "u1",
            ScreeningSubject::individual("John Doe"),
            ScreeningResult::checked("alpha"),
        );
        let screenings = vec![clear, old];

        let assessment = RiskScorer::new(&rules).assess(&ProfileInputs {
            screenings: &screenings,
            ..ProfileInputs::default()
        });
        assert!(!assessment.is_sanctioned);
    }

    #[test]
    fn test_geography_and_activity() {
        let rules = RiskRules::default();
        let mut address = completed(VerificationType::Address);
        address.address_fields = Some(HashMap::from([("country".to_string(), "ir".to_string())]));
        let verifications = vec![completed(VerificationType::Identity), address];

        let assessment = RiskScorer::new(&rules).assess(&ProfileInputs {
            screenings: &[],
            verifications: &verifications,
            suspicious_activities: 5,
        });

        assert_eq!(assessment.geographic_risk.score, 100);
        assert_eq!(assessment.geographic_risk.factors, vec!["residence:IR"]);
        assert_eq!(
            assessment.risk_factors,
            vec![RiskFactor::HighRiskGeography, RiskFactor::SuspiciousActivityHistory]
        );
        // 20 geography + 30 capped activity
        assert_eq!(assessment.risk_score.value(), 50.0);
        assert_eq!(assessment.risk_rating, RiskRating::Medium);
    }

    #[test]
    fn test_factors_co_occur() {
        let factors = derive_factors(true, true, true, true, 1);
        assert_eq!(factors.len(), 5);
        assert_eq!(derive_factors(false, false, false, false, 0), Vec::<RiskFactor>::new());
    }
}
