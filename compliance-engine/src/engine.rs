//! Compliance facade
//!
//! Plain function calls over the screening, verification and risk
//! components. Every compliance touch ensures a risk profile exists, and
//! every screening or verification event recomputes it.

use crate::config::Config;
use crate::error::{ComplianceError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use kyc::{
    next_steps, BiometricSubmission, BiometricVerifier, DocumentStore, DocumentSubmission,
    InMemoryDocumentStore, InMemoryVerificationRepository, KycVerification,
    KycVerificationStateMachine, VerificationRepository, VerificationType, Verifiers,
};
use risk_engine::{
    CddLevel, CustomerRiskProfile, InMemoryProfileRepository, InMemoryUsageLedger,
    ProfileRepository, ProposedTransaction, RiskProfileEngine, RiskRating,
    TransactionEligibilityDecision, TransactionEligibilityGate, UsageAggregator,
};
use rust_decimal::Decimal;
use screening::{
    AuditSink, InMemoryScreeningRepository, ProviderAdapter, ScreeningAggregator,
    ScreeningRecord, ScreeningRepository, ScreeningSubject, SubjectKind, TracingAuditSink,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// External collaborators the engine is wired to
#[derive(Clone)]
pub struct Collaborators {
    /// Screening history
    pub screenings: Arc<dyn ScreeningRepository>,
    /// Verification records
    pub verifications: Arc<dyn VerificationRepository>,
    /// Risk profiles
    pub profiles: Arc<dyn ProfileRepository>,
    /// Uploaded documents and selfies
    pub documents: Arc<dyn DocumentStore>,
    /// Period usage for limit checks
    pub usage: Arc<dyn UsageAggregator>,
    /// Document and biometric verifiers
    pub verifiers: Verifiers,
    /// Receives absorbed provider failures
    pub audit: Arc<dyn AuditSink>,
}

impl Collaborators {
    /// Process-local repositories, the basic format check for documents and
    /// the given biometric verifier
    pub fn in_memory(biometric: Arc<dyn BiometricVerifier>) -> Self {
        let format_check = Arc::new(kyc::BasicDocumentVerifier::default());
        Self {
            screenings: Arc::new(InMemoryScreeningRepository::new()),
            verifications: Arc::new(InMemoryVerificationRepository::new()),
            profiles: Arc::new(InMemoryProfileRepository::new()),
            documents: Arc::new(InMemoryDocumentStore::new()),
            usage: Arc::new(InMemoryUsageLedger::new()),
            verifiers: Verifiers {
                identity: format_check.clone(),
                address: format_check,
                biometric,
            },
            audit: Arc::new(TracingAuditSink),
        }
    }
}

/// Result of a screening request
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningOutcome {
    /// Persisted screening run
    pub record: ScreeningRecord,
    /// Profile after recompute
    pub profile: CustomerRiskProfile,
}

/// One verification with its outstanding steps
#[derive(Debug, Clone, Serialize)]
pub struct VerificationSummary {
    /// Record
    pub verification: KycVerification,
    /// Outstanding steps
    pub next_steps: Vec<String>,
}

/// KYC status of a customer
#[derive(Debug, Clone, Serialize)]
pub struct KycStatus {
    /// Customer
    pub user_id: String,
    /// Every verification, oldest first
    pub verifications: Vec<VerificationSummary>,
    /// Verification types still to complete
    pub required_verifications: Vec<VerificationType>,
    /// Current rating
    pub risk_rating: RiskRating,
    /// Current CDD level
    pub cdd_level: CddLevel,
}

/// The compliance decisioning engine
pub struct ComplianceEngine {
    aggregator: ScreeningAggregator,
    screenings: Arc<dyn ScreeningRepository>,
    kyc: KycVerificationStateMachine,
    risk: RiskProfileEngine,
    gate: TransactionEligibilityGate,
}

impl ComplianceEngine {
    /// Build providers from configuration and wire the collaborators
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self> {
        let adapters = config.screening.build_adapters(collaborators.audit.clone())?;
        Self::with_adapters(config, adapters, collaborators)
    }

    /// Wire an explicit set of provider adapters
    pub fn with_adapters(
        config: &Config,
        adapters: Vec<ProviderAdapter>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;
        let aggregator = ScreeningAggregator::new(adapters);
        info!(
            service = %config.service_name,
            providers = ?aggregator.provider_names(),
            "Compliance engine ready"
        );

        let kyc = KycVerificationStateMachine::new(
            collaborators.verifications.clone(),
            collaborators.documents,
            collaborators.verifiers,
            config.kyc.clone(),
        );
        let risk = RiskProfileEngine::new(
            collaborators.profiles.clone(),
            collaborators.screenings.clone(),
            collaborators.verifications,
            Arc::new(config.risk.clone()),
        );
        let gate = TransactionEligibilityGate::new(
            collaborators.profiles,
            collaborators.usage,
            Arc::new(config.gate.clone()),
        );

        Ok(Self {
            aggregator,
            screenings: collaborators.screenings,
            kyc,
            risk,
            gate,
        })
    }

    /// Start a verification
    pub fn start_verification(
        &self,
        user_id: &str,
        verification_type: VerificationType,
        provider: Option<&str>,
    ) -> Result<KycVerification> {
        let verification = self.kyc.start(user_id, verification_type, provider)?;
        self.risk.get_profile(user_id)?;
        Ok(verification)
    }

    /// Store an uploaded document and submit it
    pub async fn upload_document(
        &self,
        verification_id: Uuid,
        file_name: &str,
        content: Bytes,
        document_type: &str,
    ) -> Result<DocumentSubmission> {
        let verification = self.kyc.get(verification_id)?;
        let path = self
            .kyc
            .documents()
            .store(&verification.user_id, file_name, content)
            .await?;
        self.submit_document(verification_id, &path, document_type).await
    }

    /// Submit an already stored document
    pub async fn submit_document(
        &self,
        verification_id: Uuid,
        file_path: &str,
        document_type: &str,
    ) -> Result<DocumentSubmission> {
        let submission = self
            .kyc
            .submit_document(verification_id, file_path, document_type)
            .await?;
        self.recompute(
            &submission.verification.user_id,
            format!("document on verification {}", verification_id),
        )?;
        Ok(submission)
    }

    /// Store an uploaded selfie and submit it
    pub async fn upload_selfie(
        &self,
        verification_id: Uuid,
        file_name: &str,
        content: Bytes,
    ) -> Result<BiometricSubmission> {
        let verification = self.kyc.get(verification_id)?;
        let path = self
            .kyc
            .documents()
            .store(&verification.user_id, file_name, content)
            .await?;
        self.submit_biometric(verification_id, &path).await
    }

    /// Submit an already stored selfie
    pub async fn submit_biometric(
        &self,
        verification_id: Uuid,
        selfie_path: &str,
    ) -> Result<BiometricSubmission> {
        let submission = self.kyc.submit_biometric(verification_id, selfie_path).await?;
        self.recompute(
            &submission.verification.user_id,
            format!("selfie on verification {}", verification_id),
        )?;
        Ok(submission)
    }

    /// Reviewer rejection
    pub async fn fail_verification(&self, verification_id: Uuid, reason: &str) -> Result<KycVerification> {
        let verification = self.kyc.fail(verification_id, reason).await?;
        self.recompute(
            &verification.user_id,
            format!("failure of verification {}", verification_id),
        )?;
        Ok(verification)
    }

    /// Expire a customer's overdue verifications
    pub async fn expire_verifications(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<KycVerification>> {
        let expired = self.kyc.expire_due(user_id, now).await?;
        if !expired.is_empty() {
            self.recompute(user_id, format!("{} expired verifications", expired.len()))?;
        }
        Ok(expired)
    }

    /// Verifications, next steps and what is still required
    pub fn kyc_status(&self, user_id: &str) -> Result<KycStatus> {
        let profile = self.risk.get_profile(user_id)?;
        let history = self.kyc.history(user_id)?;
        let required_verifications = self.risk.required_verifications(&profile, &history);

        Ok(KycStatus {
            user_id: user_id.to_string(),
            verifications: history
                .into_iter()
                .map(|verification| VerificationSummary {
                    next_steps: next_steps(&verification),
                    verification,
                })
                .collect(),
            required_verifications,
            risk_rating: profile.risk_rating,
            cdd_level: profile.cdd_level,
        })
    }

    /// Screen a subject across every provider and recompute the profile
    pub async fn request_screening(
        &self,
        user_id: &str,
        subject: ScreeningSubject,
    ) -> Result<ScreeningOutcome> {
        if user_id.trim().is_empty() {
            return Err(screening::Error::Validation("user_id must not be empty".to_string()).into());
        }
        if !subject.has_required_attributes() {
            let missing = match subject.kind {
                SubjectKind::Individual => "name",
                SubjectKind::Address => "address and chain",
            };
            return Err(screening::Error::Validation(format!(
                "{} screening requires a non-empty {}",
                subject.kind.as_str(),
                missing
            ))
            .into());
        }

        let result = self.aggregator.screen(&subject).await;
        let record = ScreeningRecord::new(user_id, subject, result);
        self.screenings.save_screening(&record)?;
        let profile = self.recompute(user_id, format!("screening {}", record.screening_id))?;

        if !record.result.is_clear() {
            warn!(
                user_id,
                screening_id = %record.screening_id,
                matches = record.result.total_matches(),
                rating = ?profile.risk_rating,
                "Screening produced matches"
            );
        }
        Ok(ScreeningOutcome { record, profile })
    }

    // The event is already stored, so a transient failure gets one more try
    // before the caller sees it.
    fn recompute(&self, user_id: &str, event: String) -> Result<CustomerRiskProfile> {
        let source = match self.risk.refresh(user_id) {
            Ok(profile) => return Ok(profile),
            Err(e) if e.is_retryable() => {
                warn!(user_id, error = %e, "Risk profile recompute failed after {}, retrying", event);
                match self.risk.refresh(user_id) {
                    Ok(profile) => return Ok(profile),
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };
        warn!(user_id, error = %source, "Risk profile not updated after {}", event);
        Err(ComplianceError::ProfileNotUpdated {
            user_id: user_id.to_string(),
            event,
            source,
        })
    }

    /// Current profile, created on first read
    pub fn get_risk_profile(&self, user_id: &str) -> Result<CustomerRiskProfile> {
        Ok(self.risk.get_profile(user_id)?)
    }

    /// Report suspicious activity
    pub fn record_suspicious_activity(&self, user_id: &str) -> Result<CustomerRiskProfile> {
        Ok(self.risk.record_suspicious_activity(user_id)?)
    }

    /// Transaction-time limit check
    pub fn can_perform_transaction(
        &self,
        user_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<TransactionEligibilityDecision> {
        Ok(self.gate.can_perform_transaction(user_id, amount, currency)?)
    }

    /// Whether a transaction needs additional verification
    pub fn requires_additional_verification(&self, user_id: &str, tx: &ProposedTransaction) -> bool {
        self.gate.requires_additional_verification(user_id, tx)
    }
}
