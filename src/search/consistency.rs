//! Embedding-store consistency
//!
//! Keeps the embedding store aligned with the document collection's
//! lifecycle without blocking user-visible operations: additions and
//! updates regenerate in the background, deletions remove their record
//! synchronously so the store never holds a vector for a nonexistent
//! document.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::core::Document;
use crate::search::hybrid::SearchOrchestrator;

/// Document collection lifecycle notification
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    Created(Document),
    Updated(Document),
    Deleted(String),
    Cleared,
}

/// Subscribes to collection events and schedules embedding maintenance
pub struct ConsistencyManager {
    orchestrator: Arc<SearchOrchestrator>,
}

impl ConsistencyManager {
    pub fn new(orchestrator: Arc<SearchOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// React to a collection lifecycle event.
    ///
    /// Created/Updated schedule background generation and return its
    /// handle; the caller is free to drop it. Deleted and Cleared take
    /// effect synchronously.
    pub fn handle_event(&self, event: CollectionEvent) -> Option<JoinHandle<()>> {
        self.orchestrator.invalidate_cache();
        match event {
            CollectionEvent::Created(doc) | CollectionEvent::Updated(doc) => self.refresh(&doc),
            CollectionEvent::Deleted(id) => {
                self.orchestrator.store().remove(&id);
                None
            }
            CollectionEvent::Cleared => {
                self.orchestrator.store().clear();
                None
            }
        }
    }

    /// Schedule generation for `doc` unless its stored vector is already
    /// fresh (same text, same backend). Returns the task handle when work
    /// was scheduled.
    pub fn refresh(&self, doc: &Document) -> Option<JoinHandle<()>> {
        let backend = self.orchestrator.embedder().name();
        let content_hash = doc.content_hash();
        if self
            .orchestrator
            .store()
            .is_fresh(&doc.id, backend, &content_hash)
        {
            return None;
        }
        Some(self.spawn_embedding(doc.id.clone(), doc.embeddable_text().to_string(), content_hash))
    }

    /// Background pass over the collection: schedule generation for every
    /// document lacking a fresh vector, leave the rest untouched.
    pub fn reconcile(&self, documents: &[Document]) -> Vec<JoinHandle<()>> {
        let handles: Vec<JoinHandle<()>> =
            documents.iter().filter_map(|doc| self.refresh(doc)).collect();
        if !handles.is_empty() {
            tracing::debug!(scheduled = handles.len(), "reconciling missing embeddings");
        }
        handles
    }

    /// Force full regeneration, ignoring freshness. Used after a backend
    /// switch, when every stored vector is suspect.
    pub fn reindex(&self, documents: &[Document]) -> Vec<JoinHandle<()>> {
        self.orchestrator.invalidate_cache();
        documents
            .iter()
            .map(|doc| {
                self.spawn_embedding(
                    doc.id.clone(),
                    doc.embeddable_text().to_string(),
                    doc.content_hash(),
                )
            })
            .collect()
    }

    /// Generate and store an embedding for arbitrary text under `id`.
    ///
    /// Returns false when the id or text is empty, or when generation
    /// failed and nothing was stored. Runs synchronously.
    pub fn store_embedding(&self, id: &str, text: &str) -> bool {
        if id.trim().is_empty() || text.trim().is_empty() {
            tracing::warn!("store_embedding rejected empty id or text");
            return false;
        }

        let embedder = self.orchestrator.embedder();
        let vector = embedder.embed(text);
        if vector.iter().all(|v| *v == 0.0) {
            return false;
        }

        self.orchestrator.store().put(
            id,
            vector,
            embedder.name(),
            &crate::core::document::hash_text(text),
        );
        self.orchestrator.invalidate_cache();
        true
    }

    /// Remove one embedding record.
    pub fn clear_one(&self, id: &str) {
        self.orchestrator.store().remove(id);
        self.orchestrator.invalidate_cache();
    }

    /// Remove every embedding record.
    pub fn clear_all(&self) {
        self.orchestrator.store().clear();
        self.orchestrator.invalidate_cache();
    }

    fn spawn_embedding(&self, id: String, text: String, content_hash: String) -> JoinHandle<()> {
        let embedder = Arc::clone(self.orchestrator.embedder());
        let store = Arc::clone(self.orchestrator.store());

        tokio::task::spawn_blocking(move || {
            let vector = embedder.embed(&text);
            if vector.iter().all(|v| *v == 0.0) {
                tracing::warn!(document_id = %id, "embedding generation failed, nothing stored");
                return;
            }
            store.put(&id, vector, embedder.name(), &content_hash);
        })
    }
}
