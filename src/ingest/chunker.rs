//! Document Chunker - word windows with overlap
//!
//! Text is split on whitespace and regrouped into windows of `chunk_size` words.
//! Consecutive windows share `overlap` words so a sentence cut at a boundary
//! still appears whole in one of them.

use crate::document::Chunk;

/// Default chunk size in words (all-MiniLM-L6-v2 truncates long inputs anyway)
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Overlap between chunks to preserve context
pub const DEFAULT_OVERLAP: usize = 50;

/// Word-window chunker
#[derive(Debug, Clone)]
pub struct DocumentChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for DocumentChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentChunker {
    /// Create a new document chunker with default settings
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }

    /// Create a chunker with custom settings.
    ///
    /// The overlap is clamped below the chunk size so windows always advance.
    pub fn with_settings(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk a document into indexable chunks
    pub fn chunk_document(&self, bucket: &str, key: &str, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(idx, window)| Chunk::new(bucket, key, idx, window))
            .collect()
    }

    /// Split text into overlapping word windows
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut chunks = Vec::new();
        let step = self.chunk_size - self.overlap;

        let mut start = 0;
        while start < words.len() {
            let end = (start + self.chunk_size).min(words.len());
            chunks.push(words[start..end].join(" "));

            // Stop once this window reached the end
            if start + self.chunk_size >= words.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}
