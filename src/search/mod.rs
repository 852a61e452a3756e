//! Semantic memory index
//!
//! Hybrid search over saved content: lexical substring matching combined
//! with embedding similarity into one stable ranking.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                 Query input (debounce.rs)                      │
//! └────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//!                ┌───────────────────────────────┐
//!                │ SearchOrchestrator (hybrid.rs)│
//!                └───────────────────────────────┘
//!                     │                          │
//!                     ▼                          ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────────┐
//! │      Lexical pass            │  │      Semantic pass           │
//! │  (substring over fields)     │  │  (EmbeddingStore + Embedder) │
//! └──────────────────────────────┘  └──────────────────────────────┘
//!                     │                          │
//!                     └──────────┬───────────────┘
//!                                ▼
//!                     Merged, ranked results
//! ```
//!
//! The consistency manager (consistency.rs) keeps the embedding store
//! aligned with the document collection as it mutates.

pub mod consistency;
pub mod debounce;
pub mod embeddings;
pub mod embeddings_api;
pub mod hybrid;
pub mod similarity;
pub mod store;

// Re-export main types
pub use consistency::{CollectionEvent, ConsistencyManager};
pub use debounce::{DebouncedSearch, SearchOutcome};
pub use embeddings::{Embedder, LocalEmbedder, build_embedder, truncate_chars};
pub use embeddings_api::ApiEmbedder;
pub use hybrid::{LEXICAL_BASE_SCORE, SearchOrchestrator, SearchResult};
pub use similarity::{cosine_similarity, dot_product, l2_normalize};
pub use store::{EmbeddingRecord, EmbeddingStore, MemoryVectorStorage, VectorStorage};
