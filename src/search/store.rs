//! Embedding store
//!
//! Durable mapping from document id to vector, with an in-memory cache
//! layered over a `VectorStorage` backend. Cache and durable copy are
//! eventually consistent: every generation is flushed durably as part of
//! `put`, and storage failures are absorbed (logged, cache kept) so that
//! saving and searching never crash on a broken disk.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

/// A stored embedding: document id, vector, and provenance metadata.
///
/// `backend` records which generator produced the vector; vectors from
/// different backends are never compared, so a record whose tag differs
/// from the active backend is treated as missing. `content_hash` detects
/// material changes to the embedded text.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub document_id: String,
    pub vector: Vec<f32>,
    pub dims: usize,
    pub backend: String,
    pub content_hash: Option<String>,
    pub computed_at: String,
}

/// Durable blob-store contract the embedding store persists through
pub trait VectorStorage: Send + Sync {
    fn load_all(&self) -> Result<Vec<EmbeddingRecord>>;
    fn set(&self, record: &EmbeddingRecord) -> Result<()>;
    fn remove(&self, document_id: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    vector: Vec<f32>,
    backend: String,
    content_hash: Option<String>,
}

/// In-memory cache over durable vector storage
pub struct EmbeddingStore {
    cache: RwLock<HashMap<String, CacheEntry>>,
    storage: Arc<dyn VectorStorage>,
}

impl EmbeddingStore {
    pub fn new(storage: Arc<dyn VectorStorage>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            storage,
        }
    }

    /// One-time cache hydration from durable storage at process start.
    ///
    /// A missing or corrupt durable blob leaves the store empty rather than
    /// failing; vectors regenerate lazily afterwards.
    pub fn load_all(&self) {
        let records = match self.storage.load_all() {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, "loading embeddings failed, starting empty");
                return;
            }
        };

        let mut cache = self.cache.write();
        cache.clear();
        for record in records {
            cache.insert(
                record.document_id,
                CacheEntry {
                    vector: record.vector,
                    backend: record.backend,
                    content_hash: record.content_hash,
                },
            );
        }
    }

    /// Cache-first lookup; never generates.
    pub fn get(&self, document_id: &str) -> Option<Vec<f32>> {
        self.cache
            .read()
            .get(document_id)
            .map(|entry| entry.vector.clone())
    }

    /// Whether the stored vector for `document_id` was produced by
    /// `backend` from text matching `content_hash`.
    pub fn is_fresh(&self, document_id: &str, backend: &str, content_hash: &str) -> bool {
        self.cache.read().get(document_id).is_some_and(|entry| {
            entry.backend == backend && entry.content_hash.as_deref() == Some(content_hash)
        })
    }

    /// Upsert a vector and flush it durably. Last write wins.
    pub fn put(&self, document_id: &str, vector: Vec<f32>, backend: &str, content_hash: &str) {
        let record = EmbeddingRecord {
            document_id: document_id.to_string(),
            dims: vector.len(),
            vector: vector.clone(),
            backend: backend.to_string(),
            content_hash: Some(content_hash.to_string()),
            computed_at: chrono::Utc::now().to_rfc3339(),
        };

        self.cache.write().insert(
            document_id.to_string(),
            CacheEntry {
                vector,
                backend: backend.to_string(),
                content_hash: Some(content_hash.to_string()),
            },
        );

        if let Err(err) = self.storage.set(&record) {
            tracing::warn!(document_id, error = %err, "flushing embedding failed, cache retained");
        }
    }

    /// Remove from cache and durable storage. Removing an absent id is a
    /// no-op.
    pub fn remove(&self, document_id: &str) {
        self.cache.write().remove(document_id);
        if let Err(err) = self.storage.remove(document_id) {
            tracing::warn!(document_id, error = %err, "removing durable embedding failed");
        }
    }

    /// Empty both cache and durable storage.
    pub fn clear(&self) {
        self.cache.write().clear();
        if let Err(err) = self.storage.clear() {
            tracing::warn!(error = %err, "clearing durable embeddings failed");
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

/// In-memory `VectorStorage`, used by tests and benches.
///
/// `fail_writes` simulates a broken durable layer.
#[derive(Default)]
pub struct MemoryVectorStorage {
    records: RwLock<HashMap<String, EmbeddingRecord>>,
    pub fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryVectorStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(crate::error::StashError::Serialization(
                "simulated storage failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl VectorStorage for MemoryVectorStorage {
    fn load_all(&self) -> Result<Vec<EmbeddingRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn set(&self, record: &EmbeddingRecord) -> Result<()> {
        self.check_writable()?;
        self.records
            .write()
            .insert(record.document_id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, document_id: &str) -> Result<()> {
        self.check_writable()?;
        self.records.write().remove(document_id);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check_writable()?;
        self.records.write().clear();
        Ok(())
    }
}
