//! Hybrid search orchestration
//!
//! Combines a lexical substring pass with an embedding-similarity pass
//! into one stable ranking. Lexical hits carry a fixed base score so they
//! always outrank purely semantic matches at the boundary; semantic scores
//! stack on top. The semantic pass reuses stored vectors and generates
//! missing ones on demand, which makes every search a cache warmer.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use memchr::memmem;
use parking_lot::Mutex;

use crate::config::SearchConfig;
use crate::core::Document;
use crate::search::embeddings::Embedder;
use crate::search::similarity::cosine_similarity;
use crate::search::store::EmbeddingStore;

/// Score granted to every lexical hit
pub const LEXICAL_BASE_SCORE: f32 = 1.0;

/// A single ranked search result. Ephemeral, recomputed per query.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub combined_score: f32,
    pub lexical_hit: bool,
    pub semantic_score: f32,
}

/// Hybrid search over the live document collection
pub struct SearchOrchestrator {
    embedder: Arc<dyn Embedder>,
    store: Arc<EmbeddingStore>,
    config: SearchConfig,
    result_cache: Mutex<LruCache<u64, Vec<SearchResult>>>,
}

impl SearchOrchestrator {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<EmbeddingStore>, config: SearchConfig) -> Self {
        let cache_size =
            NonZeroUsize::new(config.result_cache_size).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            embedder,
            store,
            config,
            result_cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    pub fn store(&self) -> &Arc<EmbeddingStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Rank `documents` against `query`.
    ///
    /// Queries below the minimum length skip ranking and return the whole
    /// collection unscored, newest first.
    pub fn search(&self, query: &str, documents: &[Document]) -> Vec<SearchResult> {
        let query = query.trim();
        if query.chars().count() < self.config.min_query_len {
            return newest_first(documents);
        }

        let cache_key = result_cache_key(query);
        if let Some(cached) = self.result_cache.lock().get(&cache_key) {
            return cached.clone();
        }

        let lexical_ids = self.lexical_pass(query, documents);
        let semantic_scores = self.semantic_pass(query, documents);

        // Merge keyed by document id; iterating in input order keeps exact
        // ties stable.
        let mut results: Vec<SearchResult> = Vec::new();
        for doc in documents {
            let lexical_hit = lexical_ids.contains(doc.id.as_str());
            let semantic_score = semantic_scores.get(doc.id.as_str()).copied();

            let combined_score = match (lexical_hit, semantic_score) {
                (true, Some(score)) => LEXICAL_BASE_SCORE + score,
                (true, None) => LEXICAL_BASE_SCORE,
                (false, Some(score)) => score,
                (false, None) => continue,
            };

            results.push(SearchResult {
                document: doc.clone(),
                combined_score,
                lexical_hit,
                semantic_score: semantic_score.unwrap_or(0.0),
            });
        }

        results.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.result_cache.lock().put(cache_key, results.clone());
        results
    }

    /// Rank and truncate to the top `limit` results.
    pub fn search_with_limit(
        &self,
        query: &str,
        documents: &[Document],
        limit: usize,
    ) -> Vec<SearchResult> {
        let mut results = self.search(query, documents);
        results.truncate(limit);
        results
    }

    /// Drop cached query results. Called whenever the collection or the
    /// embedding store mutates.
    pub fn invalidate_cache(&self) {
        self.result_cache.lock().clear();
    }

    /// Lowercased-substring matching over title, url, excerpt, and text.
    fn lexical_pass<'a>(&self, query: &str, documents: &'a [Document]) -> HashSet<&'a str> {
        let needle = query.to_lowercase();
        let finder = memmem::Finder::new(needle.as_bytes());

        documents
            .iter()
            .filter(|doc| {
                [&doc.title, &doc.url, &doc.excerpt, &doc.text]
                    .into_iter()
                    .any(|field| finder.find(field.to_lowercase().as_bytes()).is_some())
            })
            .map(|doc| doc.id.as_str())
            .collect()
    }

    /// Similarity scores for documents at or above the threshold.
    ///
    /// The query is embedded once; document vectors are reused from the
    /// store when fresh, generated and stored otherwise. A failed query
    /// embedding skips the pass entirely and the search degrades to
    /// lexical-only.
    fn semantic_pass<'a>(&self, query: &str, documents: &'a [Document]) -> HashMap<&'a str, f32> {
        let query_vector = self.embedder.embed(query);
        if is_zero(&query_vector) {
            tracing::debug!("query embedding unavailable, semantic pass skipped");
            return HashMap::new();
        }

        let mut scores = HashMap::new();
        for doc in documents {
            let vector = self.document_vector(doc);
            let similarity = cosine_similarity(&query_vector, &vector);
            if similarity >= self.config.semantic_threshold {
                scores.insert(doc.id.as_str(), similarity);
            }
        }
        scores
    }

    /// Stored vector when fresh, else generate and warm the store.
    ///
    /// The zero sentinel is never persisted, so a transient backend
    /// failure stays retryable.
    fn document_vector(&self, doc: &Document) -> Vec<f32> {
        let backend = self.embedder.name();
        let content_hash = doc.content_hash();

        if self.store.is_fresh(&doc.id, backend, &content_hash) {
            if let Some(vector) = self.store.get(&doc.id) {
                return vector;
            }
        }

        let vector = self.embedder.embed(doc.embeddable_text());
        if !is_zero(&vector) {
            self.store
                .put(&doc.id, vector.clone(), backend, &content_hash);
        }
        vector
    }
}

fn newest_first(documents: &[Document]) -> Vec<SearchResult> {
    let mut docs: Vec<&Document> = documents.iter().collect();
    docs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    docs.into_iter()
        .map(|doc| SearchResult {
            document: doc.clone(),
            combined_score: 0.0,
            lexical_hit: false,
            semantic_score: 0.0,
        })
        .collect()
}

fn result_cache_key(query: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

fn is_zero(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::search::embeddings::LocalEmbedder;
    use crate::search::store::MemoryVectorStorage;

    fn orchestrator() -> SearchOrchestrator {
        orchestrator_with_config(SearchConfig::default())
    }

    fn orchestrator_with_config(config: SearchConfig) -> SearchOrchestrator {
        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(128, 512));
        let store = Arc::new(EmbeddingStore::new(Arc::new(MemoryVectorStorage::new())));
        SearchOrchestrator::new(embedder, store, config)
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new_page(
                "ML intro",
                "https://ml.example",
                "machine learning basics",
                "an introduction to machine learning and neural networks",
            ),
            Document::new_page(
                "Dinner",
                "https://food.example",
                "a recipe for pasta",
                "boil water, add pasta, stir the sauce",
            ),
        ]
    }

    /// Embedder that always fails, standing in for a broken backend.
    struct BrokenEmbedder(usize);

    impl Embedder for BrokenEmbedder {
        fn embed(&self, _text: &str) -> Vec<f32> {
            vec![0.0; self.0]
        }

        fn dims(&self) -> usize {
            self.0
        }

        fn name(&self) -> &'static str {
            "local"
        }
    }

    #[test]
    fn test_short_query_returns_all_newest_first() {
        let orch = orchestrator();
        let mut docs = corpus();
        docs[1].timestamp = docs[0].timestamp + chrono::Duration::hours(1);

        let results = orch.search("ml", &docs);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.title, "Dinner");
        assert!(results.iter().all(|r| r.combined_score == 0.0));
        assert!(results.iter().all(|r| !r.lexical_hit));
    }

    #[test]
    fn test_semantic_match_without_lexical_overlap() {
        let orch = orchestrator();
        let docs = corpus();

        // Shares tokens with the ML document but is a substring of neither
        let results = orch.search("basics of machine learning", &docs);
        assert!(!results.is_empty());
        assert_eq!(results[0].document.title, "ML intro");
        assert!(!results[0].lexical_hit);
    }

    #[test]
    fn test_lexical_hit_gets_base_score() {
        let orch = orchestrator();
        let docs = corpus();

        let results = orch.search("pasta", &docs);
        let top = &results[0];
        assert_eq!(top.document.title, "Dinner");
        assert!(top.lexical_hit);
        assert!(top.combined_score >= LEXICAL_BASE_SCORE);
    }

    #[test]
    fn test_lexical_hits_outrank_pure_semantic_matches() {
        let orch = orchestrator();
        let docs = corpus();

        let results = orch.search("pasta", &docs);
        for r in &results[1..] {
            assert!(!r.lexical_hit);
            assert!(r.combined_score < LEXICAL_BASE_SCORE);
            assert!(r.combined_score <= results[0].combined_score);
        }
    }

    #[test]
    fn test_lexical_match_is_case_insensitive() {
        let orch = orchestrator();
        let docs = corpus();
        let results = orch.search("PASTA", &docs);
        assert!(results.iter().any(|r| r.lexical_hit));
    }

    #[test]
    fn test_search_warms_the_store() {
        let orch = orchestrator();
        let docs = corpus();
        assert!(orch.store().is_empty());

        orch.search("neural networks", &docs);
        assert_eq!(orch.store().len(), docs.len());
    }

    #[test]
    fn test_search_reuses_stored_vectors() {
        let orch = orchestrator();
        let docs = corpus();
        let doc = &docs[0];

        // Pre-seed a distinctive stored vector for the first document
        let mut seeded = vec![0.0; 128];
        seeded[0] = 1.0;
        orch.store()
            .put(&doc.id, seeded.clone(), "local", &doc.content_hash());

        orch.search("neural networks", &docs);
        assert_eq!(orch.store().get(&doc.id), Some(seeded));
    }

    #[test]
    fn test_stale_hash_triggers_regeneration() {
        let orch = orchestrator();
        let docs = corpus();
        let doc = &docs[0];

        let mut seeded = vec![0.0; 128];
        seeded[0] = 1.0;
        orch.store().put(&doc.id, seeded.clone(), "local", "stale-hash");

        orch.search("neural networks", &docs);
        assert_ne!(orch.store().get(&doc.id), Some(seeded));
    }

    #[test]
    fn test_broken_backend_degrades_to_lexical_only() {
        let embedder: Arc<dyn Embedder> = Arc::new(BrokenEmbedder(128));
        let store = Arc::new(EmbeddingStore::new(Arc::new(MemoryVectorStorage::new())));
        let orch = SearchOrchestrator::new(embedder, store, SearchConfig::default());
        let docs = corpus();

        let results = orch.search("pasta", &docs);
        assert_eq!(results.len(), 1);
        assert!(results[0].lexical_hit);
        assert_eq!(results[0].semantic_score, 0.0);
        assert_eq!(results[0].combined_score, LEXICAL_BASE_SCORE);
        // Sentinels are never persisted
        assert!(orch.store().is_empty());
    }

    #[test]
    fn test_below_threshold_documents_are_excluded() {
        let config = SearchConfig {
            semantic_threshold: 0.99,
            ..Default::default()
        };
        let orch = orchestrator_with_config(config);
        let docs = corpus();

        // Nothing overlaps lexically and nothing is near-identical
        let results = orch.search("quantum entanglement photons", &docs);
        assert!(results.is_empty());
    }

    #[test]
    fn test_result_cache_hit_and_invalidation() {
        let orch = orchestrator();
        let docs = corpus();

        let first = orch.search("neural networks", &docs);
        // Cached: same ranking, no recompute against an empty collection
        let cached = orch.search("neural networks", &[]);
        assert_eq!(cached.len(), first.len());

        orch.invalidate_cache();
        let fresh = orch.search("neural networks", &[]);
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_search_with_limit_truncates() {
        let orch = orchestrator();
        let mut docs = corpus();
        for i in 0..10 {
            docs.push(Document::new_page(
                format!("pasta variant {i}"),
                "https://food.example",
                "pasta again",
                "more pasta",
            ));
        }

        let results = orch.search_with_limit("pasta", &docs, 5);
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_exact_ties_keep_input_order() {
        let orch = orchestrator();
        // Identical content: identical lexical and semantic contributions
        let a = Document::new_page("A", "https://a.example", "", "pasta");
        let b = Document::new_page("B", "https://b.example", "", "pasta");
        let docs = vec![a.clone(), b.clone()];

        let results = orch.search("pasta", &docs);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].combined_score, results[1].combined_score);
        assert_eq!(results[0].document.id, a.id);
        assert_eq!(results[1].document.id, b.id);
    }
}
