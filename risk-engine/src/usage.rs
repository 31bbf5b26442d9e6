//! Period usage for limit checks

use crate::types::UsagePeriod;
use crate::{Error, Result};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

impl UsagePeriod {
    /// Start of the calendar period containing `at`
    pub fn window_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let day = match self {
            UsagePeriod::Day => at.day(),
            UsagePeriod::Month => 1,
        };
        Utc.with_ymd_and_hms(at.year(), at.month(), day, 0, 0, 0)
            .single()
            .unwrap_or(at)
    }
}

/// Source of "current period usage" for a customer.
///
/// Implementations must answer from local state; the gate calls this on the
/// transaction path.
pub trait UsageAggregator: Send + Sync {
    /// Total executed in the period containing `at`
    fn current_usage(&self, user_id: &str, period: UsagePeriod, at: DateTime<Utc>) -> Result<Decimal>;
}

/// Executed transaction
#[derive(Debug, Clone)]
struct UsageRecord {
    transaction_id: Uuid,
    amount: Decimal,
    timestamp: DateTime<Utc>,
}

/// Process-local usage ledger
#[derive(Debug, Default)]
pub struct InMemoryUsageLedger {
    // Map: user_id -> executed transactions
    accounts: DashMap<String, Vec<UsageRecord>>,
}

impl InMemoryUsageLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an executed transaction
    pub fn record(
        &self,
        user_id: &str,
        transaction_id: Uuid,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "Usage amount must be positive, got {}",
                amount
            )));
        }
        let mut account = self.accounts.entry(user_id.to_string()).or_default();
        // replays of the same transaction count once
        if account.iter().any(|tx| tx.transaction_id == transaction_id) {
            return Ok(());
        }
        account.push(UsageRecord {
            transaction_id,
            amount,
            timestamp: at,
        });
        Ok(())
    }
}

impl UsageAggregator for InMemoryUsageLedger {
    fn current_usage(&self, user_id: &str, period: UsagePeriod, at: DateTime<Utc>) -> Result<Decimal> {
        let start = period.window_start(at);
        Ok(self
            .accounts
            .get(user_id)
            .map(|account| {
                account
                    .iter()
                    .filter(|tx| tx.timestamp >= start && tx.timestamp <= at)
                    .map(|tx| tx.amount)
                    .sum::<Decimal>()
            })
            .unwrap_or(Decimal::ZERO))
    }
}
