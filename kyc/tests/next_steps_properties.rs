use chrono::Duration;
use kyc::{next_steps, KycVerification, VerificationStatus, VerificationType};
use proptest::prelude::*;
use std::collections::HashMap;

fn status() -> impl Strategy<Value = VerificationStatus> {
    prop_oneof![
        Just(VerificationStatus::Pending),
        Just(VerificationStatus::InProgress),
        Just(VerificationStatus::Completed),
        Just(VerificationStatus::Failed),
        Just(VerificationStatus::Expired),
    ]
}

fn verification_type() -> impl Strategy<Value = VerificationType> {
    prop_oneof![
        Just(VerificationType::Identity),
        Just(VerificationType::Address),
        Just(VerificationType::Income),
        Just(VerificationType::EnhancedDueDiligence),
    ]
}

prop_compose! {
    fn verification()(
        status in status(),
        verification_type in verification_type(),
        document_type in proptest::option::of("[a-z_]{1,12}"),
        has_biometrics in any::<bool>(),
        address_fields in proptest::option::of(proptest::collection::hash_map("[a-z]{1,6}", "[A-Z0-9 ]{0,8}", 0..3)),
    ) -> KycVerification {
        let mut v = KycVerification::new("user-1", verification_type, "internal", Duration::days(30));
        v.status = status;
        v.document_type = document_type;
        v.verification_data = has_biometrics.then(|| {
            HashMap::from([("confidence_score".to_string(), serde_json::json!(90.0))])
        });
        v.address_fields = address_fields;
        v
    }
}

proptest! {
    #[test]
    fn next_steps_is_idempotent(v in verification()) {
        let snapshot = v.clone();
        let first = next_steps(&v);
        let second = next_steps(&v);

        prop_assert_eq!(first, second);
        prop_assert_eq!(v, snapshot);
    }

    #[test]
    fn completed_only_reports_completion(mut v in verification()) {
        v.status = VerificationStatus::Completed;
        prop_assert_eq!(next_steps(&v), vec!["verification_complete".to_string()]);
    }

    #[test]
    fn open_identity_without_selfie_asks_for_one(mut v in verification()) {
        v.verification_type = VerificationType::Identity;
        v.status = VerificationStatus::InProgress;
        v.verification_data = None;
        prop_assert!(next_steps(&v).contains(&"upload_selfie".to_string()));
    }
}
