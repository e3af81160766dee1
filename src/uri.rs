//! Chunk URI - Global, stable identity for every indexed chunk
//!
//! Format: `ragassist://<bucket>/<key>#<chunk_index>`
//!
//! Examples:
//! - `ragassist://my-rag-documents/ml-basics.pdf#0`
//! - `ragassist://my-rag-documents/notes/aws/lambda.md#3`

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

const SCHEME: &str = "ragassist://";

/// Global, stable URI for every chunk in the index.
///
/// This URI serves as the primary key for:
/// - Chunks
/// - Embeddings
/// - Search results
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkUri {
    /// Bucket (or local store name) holding the document
    pub bucket: String,
    /// Object key of the source document
    pub key: String,
    /// Position of the chunk within the document (0-indexed)
    pub index: usize,
}

impl ChunkUri {
    /// Create a new ChunkUri
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, index: usize) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            index,
        }
    }

    /// Parse a URI string into a ChunkUri
    ///
    /// Expected format: `ragassist://<bucket>/<key>#<chunk_index>`
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.strip_prefix(SCHEME)
            .ok_or_else(|| Error::InvalidUri(format!("URI must start with {}", SCHEME)))?;

        // Object keys may contain '#', the chunk index is always the last fragment
        let (bucket_key, index_str) = uri.rsplit_once('#')
            .ok_or_else(|| Error::InvalidUri("URI must contain # fragment".to_string()))?;

        let (bucket, key) = bucket_key.split_once('/')
            .ok_or_else(|| Error::InvalidUri("URI must contain bucket/key".to_string()))?;

        if bucket.is_empty() || key.is_empty() {
            return Err(Error::InvalidUri("bucket and key must not be empty".to_string()));
        }

        let index: usize = index_str.parse()
            .map_err(|_| Error::InvalidUri(format!("Invalid chunk index: {}", index_str)))?;

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            index,
        })
    }

    /// Convert to URI string
    pub fn to_uri_string(&self) -> String {
        format!("{}{}/{}#{}", SCHEME, self.bucket, self.key, self.index)
    }
}

impl fmt::Display for ChunkUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri_string())
    }
}

impl FromStr for ChunkUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ChunkUri {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_uri_string())
    }
}

impl<'de> Deserialize<'de> for ChunkUri {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChunkUri::parse(&s).map_err(serde::de::Error::custom)
    }
}
