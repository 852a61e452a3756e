//! Saved content: pages and social posts
//!
//! A document is a snippet of browsing content captured by an external
//! collaborator (extension, scraper, clipper). This crate only reads it;
//! ids are assigned exactly once at first persistence and never reused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// What kind of content a document holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocumentKind {
    /// A generic web page
    Page,
    /// A social post with attribution
    Post {
        author_name: String,
        author_handle: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_url: Option<String>,
    },
}

/// A saved snippet of browsing content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque unique id, stable for the document's lifetime
    pub id: String,
    pub title: String,
    pub url: String,
    /// Short summary shown in listings; preferred for embedding
    pub excerpt: String,
    /// Full extracted content
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: DocumentKind,
    /// Favicon URL, display-only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    /// Main/preview image URL, display-only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Document {
    /// Create a page document with a fresh id and the current time.
    pub fn new_page(
        title: impl Into<String>,
        url: impl Into<String>,
        excerpt: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            url: url.into(),
            excerpt: excerpt.into(),
            text: text.into(),
            timestamp: Utc::now(),
            kind: DocumentKind::Page,
            favicon: None,
            image: None,
        }
    }

    /// Create a social-post document carrying attribution.
    pub fn new_post(
        author_name: impl Into<String>,
        author_handle: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let author_name = author_name.into();
        let author_handle = author_handle.into();
        let text = text.into();
        Self {
            id: Uuid::new_v4().to_string(),
            title: format!("Post by {author_name}"),
            url: url.into(),
            excerpt: format!("Post by {author_handle}: {text}"),
            text,
            timestamp: Utc::now(),
            kind: DocumentKind::Post {
                author_name,
                author_handle,
                media_url: None,
            },
            favicon: None,
            image: None,
        }
    }

    /// Text handed to the embedding generator: the excerpt when present,
    /// otherwise the full content.
    pub fn embeddable_text(&self) -> &str {
        if self.excerpt.trim().is_empty() {
            &self.text
        } else {
            &self.excerpt
        }
    }

    /// Hash of the embeddable text, used to detect material changes.
    pub fn content_hash(&self) -> String {
        hash_text(self.embeddable_text())
    }
}

/// SHA-256 of a text, hex-encoded.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
