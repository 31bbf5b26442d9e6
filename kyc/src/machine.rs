//! Verification lifecycle
//!
//! Every mutating operation runs under a per-verification lock, works on a
//! copy of the stored record and commits it with a single versioned save.
//! A caller that drops the future before the save leaves the stored record
//! untouched.

use crate::config::KycConfig;
use crate::repository::VerificationRepository;
use crate::storage::DocumentStore;
use crate::types::{
    BiometricCheck, DocumentCheck, KycVerification, Transition, VerificationStatus,
    VerificationType,
};
use crate::verifier::{BiometricVerifier, DocumentVerifier};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Biometric confidence at or above which an identity verification completes
pub const AUTO_COMPLETE_CONFIDENCE: f64 = 80.0;

/// Type-specific verifiers
#[derive(Clone)]
pub struct Verifiers {
    /// Identity documents
    pub identity: Arc<dyn DocumentVerifier>,
    /// Proofs of address
    pub address: Arc<dyn DocumentVerifier>,
    /// Selfies
    pub biometric: Arc<dyn BiometricVerifier>,
}

/// Outcome of a document submission
#[derive(Debug, Clone)]
pub struct DocumentSubmission {
    /// Record after the submission
    pub verification: KycVerification,
    /// What the verifier said
    pub check: DocumentCheck,
}

/// Outcome of a selfie submission
#[derive(Debug, Clone)]
pub struct BiometricSubmission {
    /// Record after the submission
    pub verification: KycVerification,
    /// What the verifier said
    pub check: BiometricCheck,
}

/// Owns verification records and every change made to them
pub struct KycVerificationStateMachine {
    repository: Arc<dyn VerificationRepository>,
    documents: Arc<dyn DocumentStore>,
    verifiers: Verifiers,
    config: KycConfig,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl KycVerificationStateMachine {
    /// Create a state machine
    pub fn new(
        repository: Arc<dyn VerificationRepository>,
        documents: Arc<dyn DocumentStore>,
        verifiers: Verifiers,
        config: KycConfig,
    ) -> Self {
        Self {
            repository,
            documents,
            verifiers,
            config,
            locks: DashMap::new(),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &KycConfig {
        &self.config
    }

    /// Document store in use
    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    /// Start a new verification in `Pending`
    pub fn start(
        &self,
        user_id: &str,
        verification_type: VerificationType,
        provider: Option<&str>,
    ) -> Result<KycVerification> {
        if user_id.trim().is_empty() {
            return Err(Error::Validation("user_id must not be empty".to_string()));
        }
        let provider = provider
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.config.default_provider);

        let verification = KycVerification::new(
            user_id,
            verification_type,
            provider,
            Duration::days(self.config.verification_ttl_days),
        );
        self.repository.save_verification(&verification)?;

        info!(
            verification_id = %verification.id,
            user_id,
            "Started {} verification",
            verification_type
        );
        Ok(verification)
    }

    /// Load a verification
    pub fn get(&self, verification_id: Uuid) -> Result<KycVerification> {
        self.repository
            .find_verification(verification_id)?
            .ok_or(Error::NotFound(verification_id))
    }

    /// Every verification of a user, oldest first
    pub fn history(&self, user_id: &str) -> Result<Vec<KycVerification>> {
        self.repository.find_verifications_by_user(user_id)
    }

    /// Check a stored document and record the outcome
    pub async fn submit_document(
        &self,
        verification_id: Uuid,
        file_path: &str,
        document_type: &str,
    ) -> Result<DocumentSubmission> {
        let document_type = document_type.trim().to_lowercase();
        if document_type.is_empty() {
            return Err(Error::Validation("document_type must not be empty".to_string()));
        }
        if file_path.trim().is_empty() {
            return Err(Error::Validation("file_path must not be empty".to_string()));
        }

        let lock = self.lock_for(verification_id);
        let _guard = lock.lock().await;

        let current = self.get(verification_id)?;
        let verifier = match current.verification_type {
            VerificationType::Identity => &self.verifiers.identity,
            VerificationType::Address => &self.verifiers.address,
            other => {
                return Err(Error::UnsupportedVerificationType {
                    verification_type: other.to_string(),
                    operation: "submit document".to_string(),
                })
            }
        };
        Self::ensure_open(&current, "submit document")?;

        let accepted = self.config.accepted_document_types(current.verification_type);
        if !accepted.iter().any(|t| t == &document_type) {
            return Err(Error::Validation(format!(
                "document type {} is not accepted for {} verification",
                document_type, current.verification_type
            )));
        }

        let content = self.documents.resolve(file_path).await?;
        let check = verifier.verify(&content, &document_type).await?;
        debug!(
            verification_id = %verification_id,
            verifier = verifier.name(),
            success = check.success,
            confidence = check.confidence_score,
            "Document checked"
        );

        let now = Utc::now();
        let mut next = current.clone();
        if check.success {
            next.document_type = Some(document_type);
            next.document_path = Some(file_path.to_string());
            next.document_fingerprint = Some(fingerprint(&content));
            next.confidence_score = Some(check.confidence_score);
            next.transition(Transition::Accept, now)?;

            if next.verification_type == VerificationType::Address {
                next.address_fields = Some(check.extracted_fields.clone());
                if !check.extracted_fields.is_empty()
                    && check.confidence_score >= AUTO_COMPLETE_CONFIDENCE
                {
                    next.transition(Transition::Complete, now)?;
                }
            }
        } else if let Some(reason) = &check.terminal_failure {
            warn!(verification_id = %verification_id, "Document terminally rejected: {}", reason);
            next.failure_reason = Some(reason.clone());
            next.transition(Transition::Fail, now)?;
        } else {
            info!(
                verification_id = %verification_id,
                "Document rejected, awaiting resubmission: {}",
                check.rejection_reason.as_deref().unwrap_or("unspecified")
            );
            return Ok(DocumentSubmission {
                verification: current,
                check,
            });
        }

        let verification = self.commit(next)?;
        Ok(DocumentSubmission {
            verification,
            check,
        })
    }

    /// Check a stored selfie; completes the verification when the verifier
    /// succeeds with confidence at or above [`AUTO_COMPLETE_CONFIDENCE`]
    pub async fn submit_biometric(
        &self,
        verification_id: Uuid,
        selfie_path: &str,
    ) -> Result<BiometricSubmission> {
        if selfie_path.trim().is_empty() {
            return Err(Error::Validation("selfie_path must not be empty".to_string()));
        }

        let lock = self.lock_for(verification_id);
        let _guard = lock.lock().await;

        let current = self.get(verification_id)?;
        if current.verification_type != VerificationType::Identity {
            return Err(Error::UnsupportedVerificationType {
                verification_type: current.verification_type.to_string(),
                operation: "submit biometric".to_string(),
            });
        }
        Self::ensure_open(&current, "submit biometric")?;

        let selfie = self.documents.resolve(selfie_path).await?;
        let document = match &current.document_path {
            Some(path) => Some(self.documents.resolve(path).await?),
            None => None,
        };
        let check = self
            .verifiers
            .biometric
            .verify(&selfie, document.as_deref())
            .await?;

        let now = Utc::now();
        let mut next = current.clone();
        if let Some(reason) = &check.terminal_failure {
            warn!(verification_id = %verification_id, "Selfie terminally rejected: {}", reason);
            next.failure_reason = Some(reason.clone());
            next.transition(Transition::Fail, now)?;
        } else if current.document_type.is_none() {
            info!(
                verification_id = %verification_id,
                "Selfie received before an accepted identity document, not completing"
            );
            return Ok(BiometricSubmission {
                verification: current,
                check,
            });
        } else if check.success && check.confidence_score >= AUTO_COMPLETE_CONFIDENCE {
            next.verification_data = Some(biometric_data(&check, selfie_path, now));
            next.confidence_score = Some(check.confidence_score);
            if next.status == VerificationStatus::Pending {
                next.transition(Transition::Accept, now)?;
            }
            next.transition(Transition::Complete, now)?;
        } else {
            info!(
                verification_id = %verification_id,
                success = check.success,
                confidence = check.confidence_score,
                "Selfie below threshold, awaiting resubmission"
            );
            return Ok(BiometricSubmission {
                verification: current,
                check,
            });
        }

        let verification = self.commit(next)?;
        Ok(BiometricSubmission {
            verification,
            check,
        })
    }

    /// Reviewer rejection
    pub async fn fail(&self, verification_id: Uuid, reason: &str) -> Result<KycVerification> {
        if reason.trim().is_empty() {
            return Err(Error::Validation("failure reason must not be empty".to_string()));
        }
        let lock = self.lock_for(verification_id);
        let _guard = lock.lock().await;

        let mut next = self.get(verification_id)?;
        next.transition(Transition::Fail, Utc::now())?;
        next.failure_reason = Some(reason.trim().to_string());
        self.commit(next)
    }

    /// Expire one verification whose deadline has passed
    pub async fn expire(&self, verification_id: Uuid, now: DateTime<Utc>) -> Result<KycVerification> {
        let lock = self.lock_for(verification_id);
        let _guard = lock.lock().await;

        let mut next = self.get(verification_id)?;
        Self::ensure_open(&next, Transition::Expire.as_str())?;
        if !next.is_due_for_expiry(now) {
            return Err(Error::NotExpired(verification_id));
        }
        next.transition(Transition::Expire, now)?;
        self.commit(next)
    }

    /// Expire every overdue verification of a user
    pub async fn expire_due(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<KycVerification>> {
        let mut expired = Vec::new();
        for verification in self.history(user_id)? {
            if !verification.is_due_for_expiry(now) {
                continue;
            }
            match self.expire(verification.id, now).await {
                Ok(v) => expired.push(v),
                // raced with another transition
                Err(Error::StateConflict { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    fn ensure_open(verification: &KycVerification, operation: &str) -> Result<()> {
        if verification.status.is_terminal() {
            return Err(Error::StateConflict {
                verification_id: verification.id,
                status: verification.status,
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn lock_for(&self, verification_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(verification_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    fn commit(&self, mut verification: KycVerification) -> Result<KycVerification> {
        verification.version += 1;
        self.repository.save_verification(&verification)?;
        if verification.status.is_terminal() {
            self.locks.remove(&verification.id);
        }

        info!(
            verification_id = %verification.id,
            status = ?verification.status,
            version = verification.version,
            "Verification updated"
        );
        Ok(verification)
    }
}

/// Outstanding steps for a verification, derived only from its stored fields
pub fn next_steps(verification: &KycVerification) -> Vec<String> {
    match verification.status {
        VerificationStatus::Completed => return vec!["verification_complete".to_string()],
        VerificationStatus::Failed | VerificationStatus::Expired => {
            return vec!["start_new_verification".to_string()]
        }
        VerificationStatus::Pending | VerificationStatus::InProgress => {}
    }

    let mut steps = Vec::new();
    if verification.document_type.is_none() {
        steps.push("upload_identity_document".to_string());
    }
    match verification.verification_type {
        VerificationType::Identity if verification.verification_data.is_none() => {
            steps.push("upload_selfie".to_string());
        }
        VerificationType::Address
            if verification
                .address_fields
                .as_ref()
                .map_or(true, HashMap::is_empty) =>
        {
            steps.push("upload_address_proof".to_string());
        }
        _ => {}
    }
    steps
}

fn fingerprint(content: &[u8]) -> String {
    Sha256::digest(content)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn biometric_data(
    check: &BiometricCheck,
    selfie_path: &str,
    at: DateTime<Utc>,
) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("liveness_score".to_string(), json!(check.liveness_score)),
        ("face_match_score".to_string(), json!(check.face_match_score)),
        ("confidence_score".to_string(), json!(check.confidence_score)),
        ("selfie_path".to_string(), json!(selfie_path)),
        ("checked_at".to_string(), json!(at.to_rfc3339())),
    ])
}
