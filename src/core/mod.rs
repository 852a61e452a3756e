//! Domain model for saved content

pub mod document;

pub use document::{Document, DocumentKind};
