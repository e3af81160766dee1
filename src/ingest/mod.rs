//! Ingestion - from bucket objects to embedded chunks
//!
//! - `extract`: raw bytes to plain text (PDF, text, Markdown)
//! - `chunker`: plain text to overlapping word windows
//! - `indexer`: keeps the SQLite index in sync with the bucket

pub mod chunker;
pub mod extract;
pub mod indexer;

pub use chunker::DocumentChunker;
pub use extract::{extract_for_key, extract_text};
pub use indexer::{IndexReport, Indexer};
