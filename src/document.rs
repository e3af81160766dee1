//! Document types
//!
//! Documents are opaque objects in a bucket. Three kinds are understood:
//! - `Pdf`: text extracted page by page
//! - `Text`: plain UTF-8 text
//! - `Markdown`: treated as plain UTF-8 text
//!
//! Each document is split into chunks, and every chunk gets a [`ChunkUri`].

use crate::{Error, Result};
use crate::uri::ChunkUri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of characters shown in chunk previews
const PREVIEW_CHARS: usize = 100;

/// Kinds of documents the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Text,
    Markdown,
}

impl DocumentKind {
    /// Get the string representation of the document kind
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Text => "text",
            DocumentKind::Markdown => "markdown",
        }
    }

    /// Detect the kind from an object key's extension (case-insensitive).
    ///
    /// Returns `None` for unsupported files.
    pub fn from_key(key: &str) -> Option<Self> {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext.to_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::Text),
            "md" | "markdown" => Some(DocumentKind::Markdown),
            _ => None,
        }
    }

    /// MIME type used when uploading
    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Text => "text/plain; charset=utf-8",
            DocumentKind::Markdown => "text/markdown; charset=utf-8",
        }
    }

    pub fn all() -> &'static [DocumentKind] {
        &[DocumentKind::Pdf, DocumentKind::Text, DocumentKind::Markdown]
    }
}

impl FromStr for DocumentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "text" | "txt" => Ok(DocumentKind::Text),
            "markdown" | "md" => Ok(DocumentKind::Markdown),
            _ => Err(Error::Extract(format!("Unknown document kind: {}", s))),
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chunk of document text, the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier for this chunk
    pub uri: ChunkUri,
    /// Object key of the source document
    pub source: String,
    /// Position of the chunk within its document (0-indexed)
    pub chunk_index: usize,
    /// Chunk text
    pub text: String,
}

impl Chunk {
    pub fn new(bucket: &str, source: &str, chunk_index: usize, text: impl Into<String>) -> Self {
        Self {
            uri: ChunkUri::new(bucket, source, chunk_index),
            source: source.to_string(),
            chunk_index,
            text: text.into(),
        }
    }

    /// Short preview for display: the first 100 characters, ellipsized.
    pub fn preview(&self) -> String {
        preview(&self.text, PREVIEW_CHARS)
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Chunk {}

/// Truncate `text` to `max_chars` characters, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// A chunk with its similarity to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }
}

/// Bookkeeping for a document that has been indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub key: String,
    pub kind: DocumentKind,
    /// blake3 hex digest of the raw object bytes
    pub content_hash: String,
    /// Length of the extracted text in characters
    pub characters: usize,
    pub chunks: usize,
    pub indexed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_key() {
        assert_eq!(DocumentKind::from_key("ml.pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_key("Notes/AWS.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_key("devops.txt"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_key("readme.md"), Some(DocumentKind::Markdown));
        assert_eq!(DocumentKind::from_key("slides.pptx"), None);
        assert_eq!(DocumentKind::from_key("Makefile"), None);
        assert_eq!(DocumentKind::from_key("dir.v2/Makefile"), None);
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in DocumentKind::all() {
            let parsed: DocumentKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_preview() {
        let chunk = Chunk::new("docs", "a.txt", 0, "x".repeat(150));
        let p = chunk.preview();
        assert_eq!(p.len(), 103);
        assert!(p.ends_with("..."));

        let short = Chunk::new("docs", "a.txt", 1, "short text");
        assert_eq!(short.preview(), "short text");
    }

    #[test]
    fn test_preview_multibyte() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }
}
