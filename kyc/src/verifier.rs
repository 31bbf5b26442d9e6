//! Verifier interfaces

use crate::types::{BiometricCheck, DocumentCheck};
use crate::Result;
use async_trait::async_trait;

/// Checks one kind of document (identity document, proof of address)
#[async_trait]
pub trait DocumentVerifier: Send + Sync {
    /// Verifier name for logs
    fn name(&self) -> &str;

    /// Inspect document content. `Err` means the check could not run.
    async fn verify(&self, content: &[u8], document_type: &str) -> Result<DocumentCheck>;
}

/// Liveness and face-match check of a selfie
#[async_trait]
pub trait BiometricVerifier: Send + Sync {
    /// Verifier name for logs
    fn name(&self) -> &str;

    /// Compare a selfie against the identity document, if one was accepted
    async fn verify(&self, selfie: &[u8], identity_document: Option<&[u8]>) -> Result<BiometricCheck>;
}

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];
const PDF_MAGIC: &[u8] = b"%PDF";

/// Local format check: recognised file type and a plausible size.
///
/// Confidence grows with file size up to `full_confidence_bytes`; it never
/// extracts fields and never reports a terminal failure.
#[derive(Debug, Clone)]
pub struct BasicDocumentVerifier {
    min_bytes: usize,
    full_confidence_bytes: usize,
}

impl BasicDocumentVerifier {
    /// New verifier with explicit size bounds
    pub fn new(min_bytes: usize, full_confidence_bytes: usize) -> Self {
        Self {
            min_bytes,
            full_confidence_bytes: full_confidence_bytes.max(min_bytes + 1),
        }
    }

    fn format(content: &[u8]) -> Option<&'static str> {
        if content.starts_with(JPEG_MAGIC) {
            Some("jpeg")
        } else if content.starts_with(PNG_MAGIC) {
            Some("png")
        } else if content.starts_with(PDF_MAGIC) {
            Some("pdf")
        } else {
            None
        }
    }
}

impl Default for BasicDocumentVerifier {
    fn default() -> Self {
        Self::new(1_024, 200 * 1_024)
    }
}

#[async_trait]
impl DocumentVerifier for BasicDocumentVerifier {
    fn name(&self) -> &str {
        "basic-format"
    }

    async fn verify(&self, content: &[u8], _document_type: &str) -> Result<DocumentCheck> {
        let format = match Self::format(content) {
            Some(format) => format,
            None => return Ok(DocumentCheck::rejected("unrecognised file format")),
        };
        if content.len() < self.min_bytes {
            return Ok(DocumentCheck::rejected(format!(
                "{} file too small ({} bytes)",
                format,
                content.len()
            )));
        }

        let span = (self.full_confidence_bytes - self.min_bytes) as f64;
        let ratio = ((content.len() - self.min_bytes) as f64 / span).min(1.0);
        Ok(DocumentCheck::accepted(60.0 + 35.0 * ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(len: usize) -> Vec<u8> {
        let mut data = JPEG_MAGIC.to_vec();
        data.resize(len, 0);
        data
    }

    #[tokio::test]
    async fn test_unknown_format_rejected() {
        let check = BasicDocumentVerifier::default()
            .verify(b"hello world", "passport")
            .await
            .unwrap();
        assert!(!check.success);
        assert!(check.terminal_failure.is_none());
    }

    #[tokio::test]
    async fn test_confidence_scales_with_size() {
        let verifier = BasicDocumentVerifier::new(100, 1_100);

        let small = verifier.verify(&jpeg(50), "passport").await.unwrap();
        assert!(!small.success);

        let mid = verifier.verify(&jpeg(600), "passport").await.unwrap();
        assert!(mid.success);
        assert!((mid.confidence_score - 77.5).abs() < 1e-9);

        let large = verifier.verify(&jpeg(5_000), "passport").await.unwrap();
        assert!((large.confidence_score - 95.0).abs() < 1e-9);
    }
}
