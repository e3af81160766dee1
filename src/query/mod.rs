pub mod embedding;
pub mod retriever;

pub use embedding::{Embedder, EmbeddingEngine};
pub use retriever::Retriever;
