use crate::Result;
use crate::document::Chunk;
use fastembed::{TextEmbedding, InitOptions, EmbeddingModel};
use std::path::PathBuf;

/// Dimension of all-MiniLM-L6-v2 sentence embeddings
pub const MINILM_DIMENSION: usize = 384;

/// Anything that turns text into vectors
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Vector length produced by this embedder
    fn dimension(&self) -> usize;

    /// Generate a single embedding for a query
    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(vec![query.to_string()])?
            .pop()
            .ok_or_else(|| crate::Error::Embedding("Query embedding was empty".to_string()))
    }

    /// Generate embeddings for a batch of chunks
    fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Ok(vec![]);
        }
        self.embed(chunks.iter().map(|c| c.text.clone()).collect())
    }
}

/// Engine for generating text embeddings using local transformer models
pub struct EmbeddingEngine {
    model: TextEmbedding,
    batch_size: usize,
}

impl EmbeddingEngine {
    /// Create a new embedding engine with the default model
    pub fn new() -> Result<Self> {
        Self::with_options(None, 32)
    }

    /// Create an engine that caches model files in `cache_dir`
    pub fn with_options(cache_dir: Option<PathBuf>, batch_size: usize) -> Result<Self> {
        let mut options = InitOptions::default();
        options.model_name = EmbeddingModel::AllMiniLML6V2;
        options.show_download_progress = true;
        if let Some(dir) = cache_dir {
            options.cache_dir = dir;
        }

        tracing::info!("Loading embedding model all-MiniLM-L6-v2...");
        let model = TextEmbedding::try_new(options)
            .map_err(|e| crate::Error::Embedding(format!("Failed to load embedding model: {}", e)))?;
        tracing::info!("Embedding model loaded");

        Ok(Self { model, batch_size: batch_size.max(1) })
    }
}

impl Embedder for EmbeddingEngine {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Creating embeddings for {} texts", texts.len());
        let embeddings = self.model.embed(texts, Some(self.batch_size))
            .map_err(|e| crate::Error::Embedding(format!("Embedding generation failed: {}", e)))?;

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }
}

#[cfg(test)]
fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf29ce484222325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

/// Deterministic bag-of-words embedder for tests: each word is hashed into a bucket.
#[cfg(test)]
pub(crate) struct HashingEmbedder {
    pub dimension: usize,
}

#[cfg(test)]
impl HashingEmbedder {
    pub fn new() -> Self {
        Self { dimension: 64 }
    }
}

#[cfg(test)]
impl Embedder for HashingEmbedder {
    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimension];
                for word in text.split_whitespace() {
                    let word = word
                        .trim_matches(|c: char| !c.is_alphanumeric())
                        .to_lowercase();
                    if word.is_empty() {
                        continue;
                    }
                    vector[fnv1a(&word) as usize % self.dimension] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::cosine_similarity;

    #[test]
    fn test_hashing_embedder_similarity() {
        let embedder = HashingEmbedder::new();
        let a = embedder.embed_query("aws lambda serverless").unwrap();
        let b = embedder.embed_query("What is AWS Lambda?").unwrap();
        let c = embedder.embed_query("").unwrap();

        assert_eq!(a.len(), 64);
        assert!(cosine_similarity(&a, &b) > 0.5);
        assert_eq!(cosine_similarity(&a, &c), 0.0);
    }

    #[test]
    fn test_embed_chunks_empty() {
        let embedder = HashingEmbedder::new();
        assert!(embedder.embed_chunks(&[]).unwrap().is_empty());
    }
}
