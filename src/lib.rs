//! # ragassist - Personal RAG Assistant
//!
//! Chat with your own documents.
//!
//! ragassist provides:
//! - Object storage backends (S3 or a local directory) holding the source documents
//! - Text extraction and word-window chunking for PDF, text and Markdown files
//! - Local sentence embeddings (all-MiniLM-L6-v2) cached in SQLite
//! - Cosine retrieval and prompting of a hosted chat model
//! - Rate limiting and content filtering in front of the model
//! - An HTTP API and a small web chat UI

pub mod uri;
pub mod document;
pub mod bucket;
pub mod ingest;
pub mod storage;
pub mod query;
pub mod llm;
pub mod safety;
pub mod chat;
pub mod server;
pub mod ui;
pub mod output;
pub mod config;
pub mod ignore;

// Re-exports for convenient access
pub use uri::ChunkUri;
pub use document::{Chunk, DocumentKind, IndexedDocument, ScoredChunk};
pub use storage::SqliteIndex;
pub use config::RagConfig;

/// Result type alias for ragassist operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ragassist operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Extraction error: {0}")]
    Extract(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Status of a document during indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    New,
    Modified,
    Unchanged,
    Unsupported,
}
