//! Embedding generation
//!
//! Turns text into fixed-length vectors. Exactly one backend is active at
//! a time, chosen by configuration: `local` runs a deterministic in-process
//! hash-projection model, `api` calls a remote embedding service.
//!
//! Generation never fails outward. Every error path logs the condition and
//! returns the all-zero sentinel of the canonical dimension, so a broken
//! backend degrades search to lexical-only instead of blocking saves.

use unicode_normalization::UnicodeNormalization;

use crate::config::EmbeddingConfig;
use crate::error::{Result, StashError};
use crate::search::embeddings_api::ApiEmbedder;
use crate::search::similarity::l2_normalize;

/// Pluggable embedding backend interface
pub trait Embedder: Send + Sync {
    /// Embed text into a vector of `dims()` length.
    ///
    /// Fails closed: implementations return the zero sentinel on any
    /// internal error instead of raising.
    fn embed(&self, text: &str) -> Vec<f32>;
    fn dims(&self) -> usize;
    fn name(&self) -> &'static str;
}

/// Build an embedder from config.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let backend = config.backend.trim().to_lowercase();
    if config.dims == 0 {
        return Err(StashError::Config(
            "embedding.dims must be greater than 0".to_string(),
        ));
    }

    match backend.as_str() {
        "" | "local" => Ok(Box::new(LocalEmbedder::new(config.dims, config.max_chars))),
        "api" => Ok(Box::new(ApiEmbedder::from_config(config)?)),
        other => Err(StashError::Config(format!(
            "unknown embedding backend: {other}"
        ))),
    }
}

/// Longest prefix of `text` within the character budget.
///
/// Bounds backend latency and cost; always cuts on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// In-process hash-projection embedder (FNV-1a)
///
/// Deterministic and dependency-free: tokens and token bigrams are hashed
/// into signed positions across the vector, then the result is
/// L2-normalized so cosine similarity reduces to a dot product.
pub struct LocalEmbedder {
    dims: usize,
    max_chars: usize,
}

impl LocalEmbedder {
    pub fn new(dims: usize, max_chars: usize) -> Self {
        Self { dims, max_chars }
    }
}

impl Embedder for LocalEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dims];
        if self.dims == 0 {
            return embedding;
        }

        let tokens = tokenize(truncate_chars(text, self.max_chars));
        if tokens.is_empty() {
            tracing::debug!("no embeddable tokens in input, returning sentinel");
            return embedding;
        }

        for token in &tokens {
            accumulate_embedding(&mut embedding, token, 1.0);
        }

        for window in tokens.windows(2) {
            let bigram = format!("{} {}", window[0], window[1]);
            accumulate_embedding(&mut embedding, &bigram, 0.5);
        }

        l2_normalize(&mut embedding);
        embedding
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let lowered: String = text.nfkc().collect::<String>().to_lowercase();
    lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|token| token.len() >= 2)
        .map(|token| token.to_string())
        .collect()
}

fn accumulate_embedding(embedding: &mut [f32], token: &str, weight: f32) {
    let token_hash = fnv1a_hash(token.as_bytes());

    for i in 0..embedding.len() {
        let dim_hash = fnv1a_hash_with_salt(token_hash, i as u64);
        let sign = if dim_hash & 1 == 0 { weight } else { -weight };
        let dim = ((dim_hash >> 1) as usize) % embedding.len();
        embedding[dim] += sign;
    }
}

fn fnv1a_hash_with_salt(seed: u64, salt: u64) -> u64 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..].copy_from_slice(&salt.to_le_bytes());
    fnv1a_hash(&bytes)
}

fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
