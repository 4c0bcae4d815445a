//! Verification record store
//!
//! Used by callers of the pipeline to persist outcomes; the pipeline itself
//! never touches it.

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Fields of a verification to insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVerification {
    pub input_content: String,
    /// "text" or "url"
    pub input_type: String,
    /// `None` when no verdict could be reached
    pub verdict: Option<bool>,
    pub reasoning: String,
    pub claims: Vec<String>,
    pub sources: BTreeMap<String, Vec<String>>,
    pub headline: Option<String>,
    pub category: Option<String>,
}

/// Stored verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: Uuid,
    pub fingerprint: String,
    #[serde(flatten)]
    pub fields: NewVerification,
    pub created_at: DateTime<Utc>,
}

/// SHA-256 hex digest identifying an input regardless of surrounding whitespace
pub fn fingerprint(input_content: &str) -> String {
    hex::encode(Sha256::digest(input_content.trim().as_bytes()))
}

/// Trait for persisting verification records
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_verification(&self, fields: NewVerification) -> Result<Uuid>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<VerificationRecord>>;

    /// Look up a previously stored record for the same input
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<VerificationRecord>>;
}

/// Process-local record store
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Uuid, VerificationRecord>>,
    by_fingerprint: RwLock<HashMap<String, Uuid>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert_verification(&self, fields: NewVerification) -> Result<Uuid> {
        let record = VerificationRecord {
            id: Uuid::new_v4(),
            fingerprint: fingerprint(&fields.input_content),
            fields,
            created_at: Utc::now(),
        };
        let id = record.id;

        self.by_fingerprint
            .write()
            .await
            .insert(record.fingerprint.clone(), id);
        self.records.write().await.insert(id, record);

        Ok(id)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<VerificationRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<VerificationRecord>> {
        let id = self.by_fingerprint.read().await.get(fingerprint).copied();
        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(content: &str, verdict: Option<bool>) -> NewVerification {
        NewVerification {
            input_content: content.to_string(),
            input_type: "text".to_string(),
            verdict,
            reasoning: "because".to_string(),
            claims: vec!["The bridge opened in 1932".to_string()],
            sources: BTreeMap::from([(
                "The bridge opened in 1932".to_string(),
                vec!["https://example.com/bridge".to_string()],
            )]),
            headline: None,
            category: Some("technology".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryStore::new();
        let id = store.insert_verification(sample("bridge", Some(true))).await.unwrap();

        let record = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.fields.verdict, Some(true));
        assert_eq!(record.fields.claims.len(), 1);
        assert_eq!(store.len().await, 1);

        assert!(store.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_fingerprint() {
        let store = InMemoryStore::new();
        let id = store.insert_verification(sample("  bridge\n", None)).await.unwrap();

        let found = store.find_by_fingerprint(&fingerprint("bridge")).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(id));
        assert!(store
            .find_by_fingerprint(&fingerprint("tunnel"))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = fingerprint("hello");
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint(" hello "));
        assert_ne!(a, fingerprint("hello!"));
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = VerificationRecord {
            id: Uuid::new_v4(),
            fingerprint: fingerprint("x"),
            fields: sample("x", None),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["verdict"].is_null());
        assert_eq!(json["input_type"], "text");
    }
}
