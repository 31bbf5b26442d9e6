//! KYC configuration

use crate::types::VerificationType;
use serde::{Deserialize, Serialize};

/// KYC configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KycConfig {
    /// Days a verification may stay open before it expires
    pub verification_ttl_days: i64,

    /// Provider recorded when the caller names none
    pub default_provider: String,

    /// Accepted identity document types
    pub identity_document_types: Vec<String>,

    /// Accepted proof-of-address document types
    pub address_document_types: Vec<String>,
}

impl Default for KycConfig {
    fn default() -> Self {
        Self {
            verification_ttl_days: 30,
            default_provider: "internal".to_string(),
            identity_document_types: vec![
                "passport".to_string(),
                "national_id".to_string(),
                "drivers_license".to_string(),
            ],
            address_document_types: vec![
                "utility_bill".to_string(),
                "bank_statement".to_string(),
                "tax_document".to_string(),
                "lease_agreement".to_string(),
            ],
        }
    }
}

impl KycConfig {
    /// Document types accepted for a verification type; empty when documents
    /// are not part of that verification
    pub fn accepted_document_types(&self, verification_type: VerificationType) -> &[String] {
        match verification_type {
            VerificationType::Identity => &self.identity_document_types,
            VerificationType::Address => &self.address_document_types,
            _ => &[],
        }
    }
}
