//! Retrieval: find the chunks most similar to a question

use crate::Result;
use crate::document::ScoredChunk;
use crate::storage::{lock_index, SharedIndex};
use super::Embedder;

/// Query-time retrieval over the embedding index
pub struct Retriever<'a> {
    index: &'a SharedIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a SharedIndex, embedder: &'a dyn Embedder) -> Self {
        Self { index, embedder }
    }

    /// Embed the query and return the `top_k` most similar chunks, best first.
    /// The index is locked only for the vector scan.
    pub fn find_similar_chunks(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let query_vector = self.embedder.embed_query(query)?;
        let results = lock_index(self.index).search_by_vector(&query_vector, top_k)?;

        tracing::debug!(
            "Retrieved {} chunks for '{}' (best score {:.3})",
            results.len(),
            query,
            results.first().map(|r| r.score).unwrap_or(0.0)
        );

        Ok(results)
    }
}
