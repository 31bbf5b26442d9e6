//! Core types for KYC verification

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// What is being verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
    /// Identity document plus selfie
    Identity,
    /// Proof of address
    Address,
    /// Source of income
    Income,
    /// Enhanced due diligence review
    EnhancedDueDiligence,
}

impl VerificationType {
    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationType::Identity => "identity",
            VerificationType::Address => "address",
            VerificationType::Income => "income",
            VerificationType::EnhancedDueDiligence => "enhanced_due_diligence",
        }
    }
}

impl fmt::Display for VerificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Created, nothing submitted
    Pending,
    /// At least one check accepted
    InProgress,
    /// Verified
    Completed,
    /// Rejected
    Failed,
    /// Ran out of time
    Expired,
}

impl VerificationStatus {
    /// Completed, Failed and Expired never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Completed | VerificationStatus::Failed | VerificationStatus::Expired
        )
    }
}

/// Status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A submission was accepted
    Accept,
    /// All checks passed
    Complete,
    /// Rejected by a verifier or reviewer
    Fail,
    /// Expiry time passed
    Expire,
}

impl Transition {
    /// Operation name used in errors and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Accept => "accept submission",
            Transition::Complete => "complete",
            Transition::Fail => "fail",
            Transition::Expire => "expire",
        }
    }
}

impl VerificationStatus {
    /// Transition table. `None` means the transition is not allowed.
    pub fn next(self, transition: Transition) -> Option<VerificationStatus> {
        use Transition::*;
        use VerificationStatus::*;

        match (self, transition) {
            (Pending, Accept) | (InProgress, Accept) => Some(InProgress),
            (InProgress, Complete) => Some(Completed),
            (Pending, Fail) | (InProgress, Fail) => Some(Failed),
            (Pending, Expire) | (InProgress, Expire) => Some(Expired),
            _ => None,
        }
    }
}

/// One verification attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycVerification {
    /// Verification ID
    pub id: Uuid,
    /// Owner
    pub user_id: String,
    /// Type
    pub verification_type: VerificationType,
    /// Verification vendor or "internal"
    pub provider: String,
    /// Status
    pub status: VerificationStatus,
    /// Accepted document type
    pub document_type: Option<String>,
    /// Storage path of the accepted document
    pub document_path: Option<String>,
    /// SHA-256 of the accepted document, hex
    pub document_fingerprint: Option<String>,
    /// Latest accepted confidence (0-100)
    pub confidence_score: Option<f64>,
    /// Biometric results
    pub verification_data: Option<HashMap<String, serde_json::Value>>,
    /// Fields extracted from a proof of address
    pub address_fields: Option<HashMap<String, String>>,
    /// Why the verification failed
    pub failure_reason: Option<String>,
    /// Created
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// Completed
    pub completed_at: Option<DateTime<Utc>>,
    /// Expiry deadline
    pub expires_at: Option<DateTime<Utc>>,
    /// Incremented on every save
    pub version: u64,
}

impl KycVerification {
    /// New pending verification
    pub fn new(user_id: &str, verification_type: VerificationType, provider: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            verification_type,
            provider: provider.to_string(),
            status: VerificationStatus::Pending,
            document_type: None,
            document_path: None,
            document_fingerprint: None,
            confidence_score: None,
            verification_data: None,
            address_fields: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            expires_at: Some(now + ttl),
            version: 0,
        }
    }

    /// Apply a transition, stamping timestamps
    pub fn transition(&mut self, transition: Transition, at: DateTime<Utc>) -> crate::Result<()> {
        let next = self
            .status
            .next(transition)
            .ok_or_else(|| crate::Error::StateConflict {
                verification_id: self.id,
                status: self.status,
                operation: transition.as_str().to_string(),
            })?;

        self.status = next;
        self.updated_at = at;
        if next == VerificationStatus::Completed {
            self.completed_at = Some(at);
        }
        Ok(())
    }

    /// Whether `at` is past the expiry deadline
    pub fn is_due_for_expiry(&self, at: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.expires_at.map_or(false, |e| e <= at)
    }
}

/// Result of a document check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCheck {
    /// Document accepted
    pub success: bool,
    /// Confidence (0-100)
    pub confidence_score: f64,
    /// Set when the document must never be accepted (forged, tampered)
    pub terminal_failure: Option<String>,
    /// Human-readable reason for a non-terminal rejection
    pub rejection_reason: Option<String>,
    /// Fields read from the document
    pub extracted_fields: HashMap<String, String>,
}

impl DocumentCheck {
    /// Accepted document
    pub fn accepted(confidence_score: f64) -> Self {
        Self {
            success: true,
            confidence_score,
            terminal_failure: None,
            rejection_reason: None,
            extracted_fields: HashMap::new(),
        }
    }

    /// Rejected, may be resubmitted
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            confidence_score: 0.0,
            terminal_failure: None,
            rejection_reason: Some(reason.into()),
            extracted_fields: HashMap::new(),
        }
    }

    /// Rejected for good
    pub fn terminal(reason: impl Into<String>) -> Self {
        Self {
            terminal_failure: Some(reason.into()),
            ..Self::rejected("terminal failure")
        }
    }

    /// Attach extracted fields
    pub fn with_fields(mut self, fields: HashMap<String, String>) -> Self {
        self.extracted_fields = fields;
        self
    }
}

/// Result of a selfie check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricCheck {
    /// Verifier's overall verdict
    pub success: bool,
    /// Liveness (0-100)
    pub liveness_score: f64,
    /// Face match against the identity document (0-100)
    pub face_match_score: f64,
    /// Overall confidence (0-100)
    pub confidence_score: f64,
    /// Set when the selfie must never be accepted (spoof detected)
    pub terminal_failure: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use VerificationStatus::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(Pending.next(Transition::Accept), Some(InProgress));
        assert_eq!(InProgress.next(Transition::Accept), Some(InProgress));
        assert_eq!(InProgress.next(Transition::Complete), Some(Completed));
        assert_eq!(Pending.next(Transition::Complete), None);
        assert_eq!(Pending.next(Transition::Fail), Some(Failed));
        assert_eq!(InProgress.next(Transition::Expire), Some(Expired));
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for status in [Completed, Failed, Expired] {
            for t in [
                Transition::Accept,
                Transition::Complete,
                Transition::Fail,
                Transition::Expire,
            ] {
                assert_eq!(status.next(t), None, "{:?} --{:?}-->", status, t);
            }
        }
    }

    #[test]
    fn test_transition_stamps_completion() {
        let mut v = KycVerification::new("u1", VerificationType::Identity, "internal", Duration::days(30));
        let now = Utc::now();
        v.transition(Transition::Accept, now).unwrap();
        v.transition(Transition::Complete, now).unwrap();
        assert_eq!(v.status, Completed);
        assert_eq!(v.completed_at, Some(now));

        let err = v.transition(Transition::Fail, now).unwrap_err();
        assert!(matches!(err, crate::Error::StateConflict { .. }));
        assert_eq!(v.status, Completed);
    }
}
