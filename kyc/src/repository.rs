//! Verification persistence

use crate::types::KycVerification;
use crate::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Persistence for verification records.
///
/// `save_verification` is an optimistic write: `verification.version` must be
/// exactly one more than the stored version (or 0 for a new record).
pub trait VerificationRepository: Send + Sync {
    /// Load by ID
    fn find_verification(&self, id: Uuid) -> Result<Option<KycVerification>>;

    /// Insert or replace atomically
    fn save_verification(&self, verification: &KycVerification) -> Result<()>;

    /// Every verification a user started, oldest first
    fn find_verifications_by_user(&self, user_id: &str) -> Result<Vec<KycVerification>>;
}

/// DashMap-backed repository
#[derive(Debug, Default)]
pub struct InMemoryVerificationRepository {
    verifications: DashMap<Uuid, KycVerification>,
}

impl InMemoryVerificationRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl VerificationRepository for InMemoryVerificationRepository {
    fn find_verification(&self, id: Uuid) -> Result<Option<KycVerification>> {
        Ok(self.verifications.get(&id).map(|v| v.value().clone()))
    }

    fn save_verification(&self, verification: &KycVerification) -> Result<()> {
        match self.verifications.entry(verification.id) {
            Entry::Occupied(mut stored) => {
                let expected = stored.get().version;
                if verification.version != expected + 1 {
                    return Err(Error::ConcurrentModification {
                        verification_id: verification.id,
                        expected,
                    });
                }
                stored.insert(verification.clone());
            }
            Entry::Vacant(slot) => {
                if verification.version != 0 {
                    return Err(Error::Persistence(format!(
                        "Verification {} does not exist",
                        verification.id
                    )));
                }
                slot.insert(verification.clone());
            }
        }
        Ok(())
    }

    fn find_verifications_by_user(&self, user_id: &str) -> Result<Vec<KycVerification>> {
        let mut found: Vec<_> = self
            .verifications
            .iter()
            .filter(|v| v.user_id == user_id)
            .map(|v| v.value().clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VerificationType;
    use chrono::Duration;

    #[test]
    fn test_stale_write_rejected() {
        let repo = InMemoryVerificationRepository::new();
        let mut v = KycVerification::new("u1", VerificationType::Identity, "internal", Duration::days(30));
        repo.save_verification(&v).unwrap();

        v.version = 1;
        repo.save_verification(&v).unwrap();

        // second writer still holding version 1
        let err = repo.save_verification(&v).unwrap_err();
        assert!(matches!(err, Error::ConcurrentModification { expected: 1, .. }));
    }

    #[test]
    fn test_find_by_user() {
        let repo = InMemoryVerificationRepository::new();
        for t in [VerificationType::Identity, VerificationType::Address] {
            repo.save_verification(&KycVerification::new("u1", t, "internal", Duration::days(30)))
                .unwrap();
        }
        repo.save_verification(&KycVerification::new(
            "u2",
            VerificationType::Identity,
            "internal",
            Duration::days(30),
        ))
        .unwrap();

        assert_eq!(repo.find_verifications_by_user("u1").unwrap().len(), 2);
        assert!(repo.find_verifications_by_user("nobody").unwrap().is_empty());
    }
}
