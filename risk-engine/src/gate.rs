//! Transaction-time eligibility checks
//!
//! Everything here is synchronous: one profile read, one usage read per
//! period and arithmetic. No provider is ever called.

use crate::limits::{LimitChecker, LimitKind};
use crate::profile::ProfileRepository;
use crate::rules::GateRules;
use crate::types::{ProposedTransaction, RiskRating, TransactionEligibilityDecision, UsagePeriod};
use crate::usage::UsageAggregator;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

/// Decides whether a proposed transaction may execute
pub struct TransactionEligibilityGate {
    profiles: Arc<dyn ProfileRepository>,
    usage: Arc<dyn UsageAggregator>,
    rules: Arc<GateRules>,
}

impl TransactionEligibilityGate {
    /// Create a gate
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        usage: Arc<dyn UsageAggregator>,
        rules: Arc<GateRules>,
    ) -> Self {
        Self {
            profiles,
            usage,
            rules,
        }
    }

    /// Check a transaction against the customer's current limits.
    ///
    /// Business denials are returned as decisions; `Err` is reserved for
    /// malformed input and repository failures.
    pub fn can_perform_transaction(
        &self,
        user_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<TransactionEligibilityDecision> {
        self.can_perform_transaction_at(user_id, amount, currency, Utc::now())
    }

    /// [`can_perform_transaction`](Self::can_perform_transaction) at a fixed time
    pub fn can_perform_transaction_at(
        &self,
        user_id: &str,
        amount: Decimal,
        currency: &str,
        at: DateTime<Utc>,
    ) -> Result<TransactionEligibilityDecision> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "Transaction amount must be positive, got {}",
                amount
            )));
        }
        let currency = currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(Error::Validation("currency must not be empty".to_string()));
        }

        let profile = match self.profiles.find_profile(user_id)? {
            Some(profile) => profile,
            None => {
                info!(user_id, "Transaction denied: no risk profile");
                return Ok(TransactionEligibilityDecision::deny(
                    "No risk profile; complete verification first",
                )
                .needing_verification(true));
            }
        };
        let needs_verification = profile.risk_rating == RiskRating::Unknown
            || amount > self.rules.additional_verification_amount;

        if profile.is_sanctioned {
            info!(user_id, "Transaction denied: sanctions match");
            return Ok(TransactionEligibilityDecision::deny(
                "Customer is subject to sanctions",
            ));
        }
        if profile.restricted_currencies.contains(&currency) {
            info!(user_id, currency = %currency, "Transaction denied: restricted currency");
            return Ok(TransactionEligibilityDecision::deny(format!(
                "Currency {} is restricted for this customer",
                currency
            ))
            .needing_verification(needs_verification));
        }

        for kind in [LimitKind::Single, LimitKind::Daily, LimitKind::Monthly] {
            let limit = kind.of(&profile.limits);
            let usage = match kind.period() {
                Some(period) => self.usage.current_usage(user_id, period, at)?,
                None => Decimal::ZERO,
            };
            if !LimitChecker::within(amount, usage, limit) {
                info!(
                    user_id,
                    limit = %limit,
                    usage = %usage,
                    amount = %amount,
                    "Transaction denied: {} limit",
                    kind.label()
                );
                return Ok(TransactionEligibilityDecision::deny(denial_reason(kind, amount, usage, limit))
                    .against(limit, usage)
                    .needing_verification(needs_verification));
            }
        }

        let daily_usage = self.usage.current_usage(user_id, UsagePeriod::Day, at)?;
        debug!(user_id, amount = %amount, "Transaction allowed");
        Ok(
            TransactionEligibilityDecision::allow("Within daily limit", profile.limits.daily, daily_usage)
                .needing_verification(needs_verification),
        )
    }

    /// Whether a transaction needs verification beyond the profile, checked
    /// in order: amount above the threshold, then high-risk destination
    pub fn requires_additional_verification(&self, user_id: &str, tx: &ProposedTransaction) -> bool {
        if tx.amount > self.rules.additional_verification_amount {
            debug!(user_id, amount = %tx.amount, "Additional verification: amount");
            return true;
        }
        match tx.destination_country.as_deref() {
            Some(country) if self.rules.is_high_risk_destination(country) => {
                debug!(user_id, country, "Additional verification: destination");
                true
            }
            _ => false,
        }
    }
}

fn denial_reason(kind: LimitKind, amount: Decimal, usage: Decimal, limit: Decimal) -> String {
    match kind {
        LimitKind::Single => format!(
            "Amount {} exceeds single transaction limit {}",
            amount, limit
        ),
        _ => format!(
            "Exceeds {} limit: {} + {} used > {}",
            kind.label(),
            amount,
            usage,
            limit
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::LimitConfig;
    use crate::profile::InMemoryProfileRepository;
    use crate::types::{CustomerRiskProfile, ProfileLimits};
    use crate::usage::InMemoryUsageLedger;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    struct Fixture {
        gate: TransactionEligibilityGate,
        profiles: Arc<InMemoryProfileRepository>,
        ledger: Arc<InMemoryUsageLedger>,
    }

    fn fixture() -> Fixture {
        let profiles = Arc::new(InMemoryProfileRepository::new());
        let ledger = Arc::new(InMemoryUsageLedger::new());
        let gate = TransactionEligibilityGate::new(
            profiles.clone(),
            ledger.clone(),
            Arc::new(GateRules::default()),
        );
        Fixture {
            gate,
            profiles,
            ledger,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 12, 15, 0, 0).unwrap()
    }

    fn profile(rating: RiskRating, limits: LimitConfig) -> CustomerRiskProfile {
        let mut p = CustomerRiskProfile::new("u1", "CRP-1".to_string(), now());
        p.risk_rating = rating;
        p.limits = limits.to_limits();
        p
    }

    #[test]
    fn test_missing_profile_denied() {
        let f = fixture();
        let decision = f
            .gate
            .can_perform_transaction_at("u1", dec!(10), "USD", now())
            .unwrap();

        assert!(!decision.allowed);
        assert!(decision.requires_additional_verification);
    }

    #[test]
    fn test_unknown_profile_has_zero_limits() {
        let f = fixture();
        f.profiles
            .save_profile(&CustomerRiskProfile::new("u1", "CRP-1".to_string(), now()))
            .unwrap();

        let decision = f
            .gate
            .can_perform_transaction_at("u1", dec!(1), "USD", now())
            .unwrap();

        assert!(!decision.allowed);
        assert_eq!(decision.limit, Some(Decimal::ZERO));
        assert!(decision.requires_additional_verification);
    }

    #[test]
    fn test_daily_limit_includes_usage() {
        let f = fixture();
        f.profiles
            .save_profile(&profile(RiskRating::Low, LimitConfig::new(5_000, 10_000, 50_000)))
            .unwrap();
        f.ledger.record("u1", Uuid::new_v4(), dec!(7500), now()).unwrap();

        let decision = f
            .gate
            .can_perform_transaction_at("u1", dec!(3000), "USD", now())
            .unwrap();

        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("daily limit"));
        assert_eq!(decision.limit, Some(dec!(10000)));
        assert_eq!(decision.current_usage, Some(dec!(7500)));
    }

    #[test]
    fn test_within_limits_allowed() {
        let f = fixture();
        f.profiles
            .save_profile(&profile(RiskRating::Low, LimitConfig::new(5_000, 10_000, 50_000)))
            .unwrap();
        f.ledger.record("u1", Uuid::new_v4(), dec!(3500), now()).unwrap();

        let decision = f
            .gate
            .can_perform_transaction_at("u1", dec!(3000), "usd", now())
            .unwrap();

        assert!(decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("Within daily limit"));
        assert_eq!(decision.current_usage, Some(dec!(3500)));
        assert!(!decision.requires_additional_verification);
    }

    #[test]
    fn test_exact_limit_allowed() {
        let f = fixture();
        f.profiles
            .save_profile(&profile(RiskRating::Low, LimitConfig::new(5_000, 10_000, 50_000)))
            .unwrap();
        f.ledger.record("u1", Uuid::new_v4(), dec!(5000), now()).unwrap();

        let decision = f
            .gate
            .can_perform_transaction_at("u1", dec!(5000), "USD", now())
            .unwrap();
        assert!(decision.allowed);
    }

    #[test]
    fn test_single_and_monthly_limits() {
        let f = fixture();
        f.profiles
            .save_profile(&profile(RiskRating::Medium, LimitConfig::new(2_500, 5_000, 6_000)))
            .unwrap();

        let single = f
            .gate
            .can_perform_transaction_at("u1", dec!(3000), "USD", now())
            .unwrap();
        assert!(!single.allowed);
        assert!(single.reason.unwrap().contains("single transaction limit"));

        let earlier = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        f.ledger.record("u1", Uuid::new_v4(), dec!(4000), earlier).unwrap();
        let monthly = f
            .gate
            .can_perform_transaction_at("u1", dec!(2500), "USD", now())
            .unwrap();
        assert!(!monthly.allowed);
        assert!(monthly.reason.unwrap().contains("monthly limit"));
        assert_eq!(monthly.current_usage, Some(dec!(4000)));
    }

    #[test]
    fn test_sanctioned_and_restricted_currency() {
        let f = fixture();
        let mut p = profile(RiskRating::High, LimitConfig::new(500, 1_000, 5_000));
        p.restricted_currencies.insert("RUB".to_string());
        f.profiles.save_profile(&p).unwrap();

        let rub = f
            .gate
            .can_perform_transaction_at("u1", dec!(10), "rub", now())
            .unwrap();
        assert!(!rub.allowed);
        assert!(rub.reason.unwrap().contains("RUB"));

        p.is_sanctioned = true;
        p.limits = ProfileLimits::zero();
        p.version = 1;
        f.profiles.save_profile(&p).unwrap();
        let sanctioned = f
            .gate
            .can_perform_transaction_at("u1", dec!(10), "USD", now())
            .unwrap();
        assert!(!sanctioned.allowed);
        assert!(sanctioned.reason.unwrap().contains("sanctions"));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let f = fixture();
        let err = f
            .gate
            .can_perform_transaction_at("u1", dec!(0), "USD", now())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_additional_verification_rules() {
        let f = fixture();
        let large = ProposedTransaction::new(dec!(60000), "EUR").to_country("DE");
        assert!(f.gate.requires_additional_verification("u1", &large));

        let risky = ProposedTransaction::new(dec!(100), "EUR").to_country("ir");
        assert!(f.gate.requires_additional_verification("u1", &risky));

        let ordinary = ProposedTransaction::new(dec!(50000), "EUR").to_country("DE");
        assert!(!f.gate.requires_additional_verification("u1", &ordinary));
        assert!(!f
            .gate
            .requires_additional_verification("u1", &ProposedTransaction::new(dec!(10), "EUR")));
    }
}
