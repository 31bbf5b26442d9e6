use compliance_engine::screening::ProviderKind;
use compliance_engine::{Config, ErrorKind};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_from_file() {
    let file = write_config(
        r#"
        service_name = "compliance-eu"

        [log]
        filter = "compliance_engine=debug"
        json = true

        [screening]
        default_timeout_ms = 1500

        [[screening.providers]]
        name = "internal"
        timeout_ms = 500
        kind = { type = "heuristic", min_score = 90.0 }

        [kyc]
        verification_ttl_days = 14

        [gate]
        additional_verification_amount = "25000"
        "#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.service_name, "compliance-eu");
    assert!(config.log.json);
    assert_eq!(config.screening.default_timeout_ms, 1500);
    assert_eq!(config.screening.providers.len(), 1);
    assert_eq!(config.screening.providers[0].timeout_ms, Some(500));
    assert!(matches!(
        config.screening.providers[0].kind,
        ProviderKind::Heuristic { min_score, .. } if min_score == 90.0
    ));
    assert_eq!(config.kyc.verification_ttl_days, 14);
    assert_eq!(config.risk.high_risk_threshold, 70.0);
}

#[test]
fn test_duplicate_provider_rejected() {
    let file = write_config(
        r#"
        [screening]
        default_timeout_ms = 1000

        [[screening.providers]]
        name = "internal"
        kind = { type = "heuristic", min_score = 85.0 }

        [[screening.providers]]
        name = "internal"
        kind = { type = "heuristic", min_score = 70.0 }
        "#,
    );

    let err = Config::from_file(file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("Duplicate provider name"));
}

#[test]
fn test_missing_file() {
    let err = Config::from_file("/nonexistent/compliance.toml").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_malformed_toml() {
    let file = write_config("service_name = [");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"));
}

// Environment variables are process-wide, so every case runs in one test
#[test]
fn test_from_env() {
    std::env::set_var("COMPLIANCE_LOG_FILTER", "kyc=trace");
    std::env::set_var("COMPLIANCE_LOG_JSON", "true");
    std::env::set_var("COMPLIANCE_PROVIDER_TIMEOUT_MS", "750");
    std::env::set_var("COMPLIANCE_VERIFICATION_TTL_DAYS", "7");

    let config = Config::from_env().unwrap();
    assert_eq!(config.log.filter, "kyc=trace");
    assert!(config.log.json);
    assert_eq!(config.screening.default_timeout_ms, 750);
    assert_eq!(config.kyc.verification_ttl_days, 7);

    std::env::set_var("COMPLIANCE_VERIFICATION_TTL_DAYS", "0");
    let err = Config::from_env().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    std::env::set_var("COMPLIANCE_VERIFICATION_TTL_DAYS", "seven");
    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("COMPLIANCE_VERIFICATION_TTL_DAYS"));

    for var in [
        "COMPLIANCE_LOG_FILTER",
        "COMPLIANCE_LOG_JSON",
        "COMPLIANCE_PROVIDER_TIMEOUT_MS",
        "COMPLIANCE_VERIFICATION_TTL_DAYS",
    ] {
        std::env::remove_var(var);
    }
}
