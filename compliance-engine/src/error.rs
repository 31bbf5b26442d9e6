//! Unified error type for the compliance surface

use thiserror::Error;

/// Result type for the compliance engine
pub type Result<T> = std::result::Result<T, ComplianceError>;

/// Errors surfaced to callers
#[derive(Error, Debug)]
pub enum ComplianceError {
    /// Screening failure (validation, persistence, provider construction)
    #[error(transparent)]
    Screening(#[from] screening::Error),

    /// Verification failure
    #[error(transparent)]
    Kyc(#[from] kyc::Error),

    /// Risk profile or gate failure
    #[error(transparent)]
    Risk(#[from] risk_engine::Error),

    /// An event was stored but the profile could not be recomputed. The
    /// next recompute for the customer picks the event up.
    #[error("Risk profile for {user_id} not updated after {event}: {source}")]
    ProfileNotUpdated {
        /// Customer
        user_id: String,
        /// Stored event, e.g. `screening <id>`
        event: String,
        /// Last recompute failure
        #[source]
        source: risk_engine::Error,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification for callers mapping errors onto responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input
    Validation,
    /// Operation not allowed in the current state
    StateConflict,
    /// Unknown record
    NotFound,
    /// Storage or repository failure
    Persistence,
    /// Collaborator unreachable
    Unavailable,
    /// Bad configuration
    Config,
}

impl ComplianceError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ComplianceError::Screening(e) => screening_kind(e),
            ComplianceError::Kyc(e) => kyc_kind(e),
            ComplianceError::Risk(e) => risk_kind(e),
            ComplianceError::ProfileNotUpdated { source, .. } => risk_kind(source),
            ComplianceError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ComplianceError::Kyc(e) => e.is_retryable(),
            ComplianceError::Risk(e) => e.is_retryable(),
            ComplianceError::ProfileNotUpdated { source, .. } => source.is_retryable(),
            ComplianceError::Screening(e) => matches!(
                screening_kind(e),
                ErrorKind::Persistence | ErrorKind::Unavailable
            ),
            ComplianceError::Config(_) => false,
        }
    }
}

fn screening_kind(e: &screening::Error) -> ErrorKind {
    use screening::Error::*;
    match e {
        Validation(_) => ErrorKind::Validation,
        ProviderUnavailable { .. } | Http(_) => ErrorKind::Unavailable,
        Persistence(_) => ErrorKind::Persistence,
        Json(_) | Csv(_) | Config(_) => ErrorKind::Config,
    }
}

fn kyc_kind(e: &kyc::Error) -> ErrorKind {
    use kyc::Error::*;
    match e {
        Validation(_) | UnsupportedVerificationType { .. } => ErrorKind::Validation,
        StateConflict { .. } | NotExpired(_) => ErrorKind::StateConflict,
        NotFound(_) => ErrorKind::NotFound,
        ConcurrentModification { .. } | Storage(_) | Persistence(_) => ErrorKind::Persistence,
        Verifier(_) => ErrorKind::Unavailable,
    }
}

fn risk_kind(e: &risk_engine::Error) -> ErrorKind {
    use risk_engine::Error::*;
    match e {
        Validation(_) => ErrorKind::Validation,
        ConcurrentModification { .. } | Persistence(_) => ErrorKind::Persistence,
        InvalidConfig(_) => ErrorKind::Config,
        Screening(inner) => screening_kind(inner),
        Kyc(inner) => kyc_kind(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_kinds() {
        let conflict: ComplianceError = kyc::Error::StateConflict {
            verification_id: Uuid::new_v4(),
            status: kyc::VerificationStatus::Completed,
            operation: "submit document".to_string(),
        }
        .into();
        assert_eq!(conflict.kind(), ErrorKind::StateConflict);
        assert!(!conflict.is_retryable());

        let stored: ComplianceError = risk_engine::Error::Persistence("disk full".to_string()).into();
        assert_eq!(stored.kind(), ErrorKind::Persistence);
        assert!(stored.is_retryable());

        let nested: ComplianceError =
            risk_engine::Error::from(kyc::Error::Storage("bucket down".to_string())).into();
        assert_eq!(nested.kind(), ErrorKind::Persistence);
        assert!(nested.is_retryable());

        let invalid: ComplianceError = screening::Error::Validation("empty name".to_string()).into();
        assert_eq!(invalid.kind(), ErrorKind::Validation);

        let stale = ComplianceError::ProfileNotUpdated {
            user_id: "u1".to_string(),
            event: "screening 42".to_string(),
            source: risk_engine::Error::Persistence("timeout".to_string()),
        };
        assert_eq!(stale.kind(), ErrorKind::Persistence);
        assert!(stale.is_retryable());
        assert!(stale.to_string().contains("screening 42"));
    }
}
