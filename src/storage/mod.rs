//! Storage Layer - SQLite-backed embedding cache
//!
//! Embedding every document on each question is slow, so extracted chunks and
//! their vectors are persisted in SQLite with tables:
//! - documents(key, kind, content_hash, characters, chunks, indexed_at)
//! - chunks(uri, source, chunk_index, text)
//! - embeddings(uri, vector)

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteIndex, IndexStats};

use std::sync::{Arc, Mutex, MutexGuard};

/// Index shared between the server, the chat service and re-indexing.
/// Only lock it from blocking code.
pub type SharedIndex = Arc<Mutex<SqliteIndex>>;

pub fn shared(index: SqliteIndex) -> SharedIndex {
    Arc::new(Mutex::new(index))
}

/// Lock the shared index. Writes are transactional, so a poisoned lock still
/// guards a consistent database.
pub fn lock_index(index: &SharedIndex) -> MutexGuard<'_, SqliteIndex> {
    index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
