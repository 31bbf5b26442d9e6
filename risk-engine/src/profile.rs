//! Customer risk profiles

use crate::rules::RiskRules;
use crate::scoring::{has_completed, ProfileInputs, RiskScorer};
use crate::types::{CddLevel, CustomerRiskProfile, ProfileLimits, RiskRating};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kyc::{KycVerification, VerificationRepository, VerificationType};
use parking_lot::Mutex;
use rand::Rng;
use screening::ScreeningRepository;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Persistence for risk profiles.
///
/// `save_profile` is an optimistic write: `profile.version` must be exactly
/// one more than the stored version (or 0 for a new profile).
pub trait ProfileRepository: Send + Sync {
    /// Load a profile
    fn find_profile(&self, user_id: &str) -> Result<Option<CustomerRiskProfile>>;

    /// Insert or replace atomically
    fn save_profile(&self, profile: &CustomerRiskProfile) -> Result<()>;

    /// Load the profile, creating `seed` if none exists. The flag is true when
    /// `seed` was stored.
    fn get_or_create(&self, seed: CustomerRiskProfile) -> Result<(CustomerRiskProfile, bool)>;
}

/// DashMap-backed profile repository
#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    profiles: DashMap<String, CustomerRiskProfile>,
}

impl InMemoryProfileRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileRepository for InMemoryProfileRepository {
    fn find_profile(&self, user_id: &str) -> Result<Option<CustomerRiskProfile>> {
        Ok(self.profiles.get(user_id).map(|p| p.value().clone()))
    }

    fn save_profile(&self, profile: &CustomerRiskProfile) -> Result<()> {
        match self.profiles.entry(profile.user_id.clone()) {
            Entry::Occupied(mut stored) => {
                let expected = stored.get().version;
                if profile.version != expected + 1 {
                    return Err(Error::ConcurrentModification {
                        user_id: profile.user_id.clone(),
                        expected,
                    });
                }
                stored.insert(profile.clone());
            }
            Entry::Vacant(slot) => {
                if profile.version != 0 {
                    return Err(Error::Persistence(format!(
                        "Risk profile for {} does not exist",
                        profile.user_id
                    )));
                }
                slot.insert(profile.clone());
            }
        }
        Ok(())
    }

    fn get_or_create(&self, seed: CustomerRiskProfile) -> Result<(CustomerRiskProfile, bool)> {
        match self.profiles.entry(seed.user_id.clone()) {
            Entry::Occupied(stored) => Ok((stored.get().clone(), false)),
            Entry::Vacant(slot) => {
                slot.insert(seed.clone());
                Ok((seed, true))
            }
        }
    }
}

/// Derives and maintains customer risk profiles
pub struct RiskProfileEngine {
    profiles: Arc<dyn ProfileRepository>,
    screenings: Arc<dyn ScreeningRepository>,
    verifications: Arc<dyn VerificationRepository>,
    rules: Arc<RiskRules>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RiskProfileEngine {
    /// Create an engine
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        screenings: Arc<dyn ScreeningRepository>,
        verifications: Arc<dyn VerificationRepository>,
        rules: Arc<RiskRules>,
    ) -> Self {
        Self {
            profiles,
            screenings,
            verifications,
            rules,
            locks: DashMap::new(),
        }
    }

    /// Rules in use
    pub fn rules(&self) -> &RiskRules {
        &self.rules
    }

    /// Current profile without creating one
    pub fn find_profile(&self, user_id: &str) -> Result<Option<CustomerRiskProfile>> {
        self.profiles.find_profile(user_id)
    }

    /// Current profile, created with unknown rating on first touch
    pub fn get_profile(&self, user_id: &str) -> Result<CustomerRiskProfile> {
        Ok(self.ensure(user_id)?.0)
    }

    /// Create the profile if missing, otherwise recompute it
    pub fn create_or_update(&self, user_id: &str) -> Result<CustomerRiskProfile> {
        let (profile, created) = self.ensure(user_id)?;
        if created {
            return Ok(profile);
        }
        self.recompute(user_id, |_| {})
    }

    /// Create the profile if missing and recompute it from the latest data
    pub fn refresh(&self, user_id: &str) -> Result<CustomerRiskProfile> {
        self.ensure(user_id)?;
        self.recompute(user_id, |_| {})
    }

    /// Count a suspicious activity report and recompute
    pub fn record_suspicious_activity(&self, user_id: &str) -> Result<CustomerRiskProfile> {
        self.ensure(user_id)?;
        let profile = self.recompute(user_id, |p| p.suspicious_activities_count += 1)?;
        warn!(
            user_id,
            count = profile.suspicious_activities_count,
            "Suspicious activity recorded"
        );
        Ok(profile)
    }

    /// PEP, sanctioned, or score above the high-risk threshold
    pub fn requires_enhanced_due_diligence(&self, profile: &CustomerRiskProfile) -> bool {
        profile.is_pep
            || profile.is_sanctioned
            || self.rules.is_high_risk(profile.risk_score.value())
    }

    /// Verification types the customer still has to complete
    pub fn required_verifications(
        &self,
        profile: &CustomerRiskProfile,
        history: &[KycVerification],
    ) -> Vec<VerificationType> {
        let mut required = Vec::new();
        for t in [VerificationType::Identity, VerificationType::Address] {
            if !has_completed(history, t) {
                required.push(t);
            }
        }
        if self.requires_enhanced_due_diligence(profile)
            && !has_completed(history, VerificationType::EnhancedDueDiligence)
        {
            required.push(VerificationType::EnhancedDueDiligence);
        }
        required
    }

    fn ensure(&self, user_id: &str) -> Result<(CustomerRiskProfile, bool)> {
        if user_id.trim().is_empty() {
            return Err(Error::Validation("user_id must not be empty".to_string()));
        }
        let now = Utc::now();
        let seed = CustomerRiskProfile::new(user_id, profile_number(now), now);
        let (profile, created) = self.profiles.get_or_create(seed)?;
        if created {
            info!(user_id, profile_number = %profile.profile_number, "Risk profile created");
        }
        Ok((profile, created))
    }

    // Whole profile is rebuilt on a copy and committed with one save.
    fn recompute(
        &self,
        user_id: &str,
        mutate: impl FnOnce(&mut CustomerRiskProfile),
    ) -> Result<CustomerRiskProfile> {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _guard = lock.lock();

        let current = self
            .profiles
            .find_profile(user_id)?
            .ok_or_else(|| Error::Persistence(format!("Risk profile for {} vanished", user_id)))?;
        let screenings = self.screenings.find_screenings(user_id)?;
        let verifications = self.verifications.find_verifications_by_user(user_id)?;

        let mut next = current.clone();
        mutate(&mut next);
        self.apply(&mut next, &screenings, &verifications, Utc::now());
        next.version = current.version + 1;
        self.profiles.save_profile(&next)?;

        if next.risk_rating != current.risk_rating {
            info!(
                user_id,
                from = ?current.risk_rating,
                to = ?next.risk_rating,
                score = %next.risk_score,
                "Risk rating changed"
            );
        } else {
            debug!(user_id, score = %next.risk_score, "Risk profile recomputed");
        }
        Ok(next)
    }

    fn apply(
        &self,
        profile: &mut CustomerRiskProfile,
        screenings: &[screening::ScreeningRecord],
        verifications: &[KycVerification],
        now: DateTime<Utc>,
    ) {
        let assessment = RiskScorer::new(&self.rules).assess(&ProfileInputs {
            screenings,
            verifications,
            suspicious_activities: profile.suspicious_activities_count,
        });

        profile.is_pep = assessment.is_pep;
        profile.is_sanctioned = assessment.is_sanctioned;
        profile.has_adverse_media = assessment.has_adverse_media;
        profile.geographic_risk = assessment.geographic_risk;
        profile.risk_factors = assessment.risk_factors;
        profile.risk_score = assessment.risk_score;
        profile.risk_rating = assessment.risk_rating;

        let tier = self.rules.tiers.for_rating(profile.risk_rating);
        profile.limits = if profile.is_sanctioned {
            ProfileLimits::zero()
        } else {
            tier.limits.to_limits()
        };
        profile.cdd_level = if tier.cdd_level == CddLevel::Enhanced
            || self.requires_enhanced_due_diligence(profile)
        {
            CddLevel::Enhanced
        } else {
            CddLevel::Standard
        };

        let high = profile.risk_rating == RiskRating::High;
        profile.restricted_countries = self.rules.embargoed_countries.clone();
        if high {
            profile
                .restricted_countries
                .extend(self.rules.high_risk_countries.iter().cloned());
        }
        profile.restricted_currencies = if high || profile.is_sanctioned {
            self.rules.high_risk_currencies.clone()
        } else {
            Default::default()
        };
        profile.enhanced_monitoring =
            profile.cdd_level == CddLevel::Enhanced || profile.suspicious_activities_count > 0;

        profile.last_reviewed_at = Some(now);
        profile.next_review_at = tier.review_interval_days.map(|d| now + Duration::days(d));
        profile.updated_at = now;
    }
}

fn profile_number(at: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("CRP-{}-{:08X}", at.format("%Y%m%d"), suffix)
}
