//! Tier table and limit checks

use crate::types::{CddLevel, ProfileLimits, RiskRating, UsagePeriod};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Limit configuration for one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Single transaction limit
    pub single_transaction: Decimal,

    /// Calendar-day limit
    pub daily_limit: Decimal,

    /// Calendar-month limit
    pub monthly_limit: Decimal,
}

impl LimitConfig {
    /// Build from whole currency units
    pub fn new(single: i64, daily: i64, monthly: i64) -> Self {
        Self {
            single_transaction: Decimal::from(single),
            daily_limit: Decimal::from(daily),
            monthly_limit: Decimal::from(monthly),
        }
    }

    /// As profile limits
    pub fn to_limits(&self) -> ProfileLimits {
        ProfileLimits {
            daily: self.daily_limit,
            monthly: self.monthly_limit,
            single: self.single_transaction,
        }
    }

    fn validate(&self, tier: &str) -> Result<()> {
        let all = [self.single_transaction, self.daily_limit, self.monthly_limit];
        if all.iter().any(|l| l.is_sign_negative()) {
            return Err(Error::InvalidConfig(format!("{} tier has a negative limit", tier)));
        }
        if self.daily_limit > self.monthly_limit {
            return Err(Error::InvalidConfig(format!(
                "{} tier daily limit {} exceeds monthly limit {}",
                tier, self.daily_limit, self.monthly_limit
            )));
        }
        Ok(())
    }
}

/// What a risk tier grants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Limits
    pub limits: LimitConfig,
    /// Due diligence level
    pub cdd_level: CddLevel,
    /// Days until the next periodic review; `None` schedules none
    pub review_interval_days: Option<i64>,
}

/// Tier table keyed by rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    /// Low risk
    pub low: TierPolicy,
    /// Medium risk
    pub medium: TierPolicy,
    /// High risk
    pub high: TierPolicy,
    /// Not yet rated
    pub unknown: TierPolicy,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            low: TierPolicy {
                limits: LimitConfig::new(5_000, 10_000, 50_000),
                cdd_level: CddLevel::Standard,
                review_interval_days: Some(365),
            },
            medium: TierPolicy {
                limits: LimitConfig::new(2_500, 5_000, 25_000),
                cdd_level: CddLevel::Standard,
                review_interval_days: Some(180),
            },
            high: TierPolicy {
                limits: LimitConfig::new(500, 1_000, 5_000),
                cdd_level: CddLevel::Enhanced,
                review_interval_days: Some(90),
            },
            unknown: TierPolicy {
                limits: LimitConfig::new(0, 0, 0),
                cdd_level: CddLevel::Standard,
                review_interval_days: None,
            },
        }
    }
}

impl TierTable {
    /// Policy for a rating
    pub fn for_rating(&self, rating: RiskRating) -> &TierPolicy {
        match rating {
            RiskRating::Low => &self.low,
            RiskRating::Medium => &self.medium,
            RiskRating::High => &self.high,
            RiskRating::Unknown => &self.unknown,
        }
    }

    /// Check every tier
    pub fn validate(&self) -> Result<()> {
        self.low.limits.validate("low")?;
        self.medium.limits.validate("medium")?;
        self.high.limits.validate("high")?;
        self.unknown.limits.validate("unknown")?;
        Ok(())
    }
}

/// Which limit a check ran against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// Per transaction
    Single,
    /// Per calendar day
    Daily,
    /// Per calendar month
    Monthly,
}

impl LimitKind {
    /// Usage period the limit applies to
    pub fn period(&self) -> Option<UsagePeriod> {
        match self {
            LimitKind::Single => None,
            LimitKind::Daily => Some(UsagePeriod::Day),
            LimitKind::Monthly => Some(UsagePeriod::Month),
        }
    }

    /// Limit value on a profile
    pub fn of(&self, limits: &ProfileLimits) -> Decimal {
        match self {
            LimitKind::Single => limits.single,
            LimitKind::Daily => limits.daily,
            LimitKind::Monthly => limits.monthly,
        }
    }

    /// Label used in decision reasons
    pub fn label(&self) -> &'static str {
        match self {
            LimitKind::Single => "single transaction",
            LimitKind::Daily => "daily",
            LimitKind::Monthly => "monthly",
        }
    }
}

/// Limit checker
pub struct LimitChecker;

impl LimitChecker {
    /// Whether `amount` on top of `usage` stays within `limit`
    pub fn within(amount: Decimal, usage: Decimal, limit: Decimal) -> bool {
        amount + usage <= limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_tiers() {
        let table = TierTable::default();
        assert_eq!(table.low.limits.to_limits().daily, dec!(10000));
        assert_eq!(table.high.cdd_level, CddLevel::Enhanced);
        assert_eq!(table.for_rating(RiskRating::Unknown).limits.to_limits(), ProfileLimits::zero());
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_limit_kinds_against_tier() {
        let limits = TierTable::default().low.limits.to_limits();

        assert!(LimitChecker::within(dec!(5000), Decimal::ZERO, LimitKind::Single.of(&limits)));
        assert!(!LimitChecker::within(dec!(5000.01), Decimal::ZERO, LimitKind::Single.of(&limits)));
        assert!(LimitChecker::within(dec!(3000), dec!(7000), LimitKind::Daily.of(&limits)));
        assert!(!LimitChecker::within(dec!(3000), dec!(7000.01), LimitKind::Daily.of(&limits)));
        assert!(!LimitChecker::within(dec!(1), dec!(50000), LimitKind::Monthly.of(&limits)));
        assert_eq!(LimitKind::Single.period(), None);
    }

    #[test]
    fn test_inverted_limits_rejected() {
        let mut table = TierTable::default();
        table.medium.limits = LimitConfig::new(100, 10_000, 1_000);
        assert!(matches!(table.validate(), Err(Error::InvalidConfig(_))));
    }
}
