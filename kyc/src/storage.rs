//! Document and selfie storage

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use uuid::Uuid;

/// Where uploaded files live
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a file, returning its path
    async fn store(&self, owner: &str, file_name: &str, content: Bytes) -> Result<String>;

    /// Read a previously stored file
    async fn resolve(&self, path: &str) -> Result<Bytes>;
}

/// Process-local store, keyed by generated path
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    files: DashMap<String, Bytes>,
}

impl InMemoryDocumentStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn store(&self, owner: &str, file_name: &str, content: Bytes) -> Result<String> {
        if content.is_empty() {
            return Err(Error::Validation("Uploaded file is empty".to_string()));
        }
        let path = format!("kyc/{}/{}-{}", owner, Uuid::new_v4(), file_name);
        self.files.insert(path.clone(), content);
        Ok(path)
    }

    async fn resolve(&self, path: &str) -> Result<Bytes> {
        self.files
            .get(path)
            .map(|f| f.value().clone())
            .ok_or_else(|| Error::Storage(format!("No file at {}", path)))
    }
}
